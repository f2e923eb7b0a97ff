//! Builds a stable-ordered agent population from `RuntimeConfig` counts and
//! distribution parameters (spec.md §4.7 "Factory").

use market_core::config::RuntimeConfig;
use market_core::Agent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, LogNormal, Normal};

use crate::cross_effects::CrossEffectsAgent;
use crate::event::EventAgent;
use crate::fundamental::FundamentalAgent;
use crate::inventory::InventoryAgent;
use crate::market_maker::MarketMakerAgent;
use crate::mean_reversion::MeanReversionAgent;
use crate::momentum::MomentumAgent;
use crate::noise::NoiseAgent;
use crate::supply_demand::SupplyDemandAgent;

/// Samples from `Normal(mean, sigma)` and re-draws (bounded attempts) until
/// the value clears `floor`, falling back to `floor` itself.
fn truncated_normal_floor(mean: f64, sigma: f64, floor: f64, rng: &mut StdRng) -> f64 {
    let normal = Normal::new(mean, sigma.max(1e-9)).unwrap();
    for _ in 0..32 {
        let sample = normal.sample(rng);
        if sample >= floor {
            return sample;
        }
    }
    floor
}

fn pick_symbol<'a>(symbols: &'a [String], index: usize) -> &'a str {
    &symbols[index % symbols.len()]
}

/// Builds the full population in a fixed order (fundamental, momentum,
/// mean-reversion, noise, market maker, supply/demand, cross-effects,
/// inventory, event), each block internally ordered by ascending id, so two
/// runs with the same config and seed produce an identical roster.
pub fn build_population(config: &RuntimeConfig, symbols: &[String], seed: u64) -> Vec<Box<dyn Agent>> {
    if symbols.is_empty() {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let counts = &config.agent_counts;
    let params = &config.agent_params;
    let mm = &config.market_maker;

    let horizon_dist = LogNormal::new(params.horizon_mu.ln().max(0.0), params.horizon_sigma.max(1e-6)).unwrap();
    let reaction_dist = Exp::new(params.reaction_speed_rate.max(1e-6)).unwrap();
    let risk_dist = Normal::new(params.risk_aversion_mu, params.risk_aversion_sigma.max(1e-9)).unwrap();

    let mut agents: Vec<Box<dyn Agent>> = Vec::new();
    let mut next_id = 1u64;

    let mut sample_cash = |rng: &mut StdRng| {
        truncated_normal_floor(params.initial_cash_mean, params.initial_cash_sigma, params.initial_cash_floor, rng)
    };
    let mut sample_confidence = |rng: &mut StdRng| rng.gen_range(params.confidence_min..=params.confidence_max);

    for i in 0..counts.fundamental {
        let symbol = pick_symbol(symbols, i as usize);
        let threshold = 0.02 / sample_confidence(&mut rng).max(0.01);
        let cash = sample_cash(&mut rng);
        agents.push(Box::new(FundamentalAgent::new(
            next_id,
            symbol,
            cash,
            threshold,
            0.005,
            params.news_weight,
            params.capital_fraction,
            params.max_order_size,
            params.cash_reserve,
            params.max_short,
            seed.wrapping_add(next_id),
        )));
        next_id += 1;
    }

    for i in 0..counts.momentum {
        let symbol = pick_symbol(symbols, i as usize);
        let horizon = horizon_dist.sample(&mut rng).max(2.0);
        let long_window = horizon.round() as usize;
        let short_window = (long_window / 3).max(1);
        let risk_aversion = risk_dist.sample(&mut rng).abs().max(0.1);
        let cash = sample_cash(&mut rng);
        agents.push(Box::new(MomentumAgent::new(
            next_id,
            symbol,
            cash,
            short_window,
            long_window,
            0.002,
            risk_aversion,
            0.002,
            params.capital_fraction,
            params.max_order_size,
            params.cash_reserve,
            params.max_short,
        )));
        next_id += 1;
    }

    for i in 0..counts.mean_reversion {
        let symbol = pick_symbol(symbols, i as usize);
        let horizon = horizon_dist.sample(&mut rng).max(3.0);
        let lookback = horizon.round() as usize;
        let cash = sample_cash(&mut rng);
        agents.push(Box::new(MeanReversionAgent::new(
            next_id,
            symbol,
            cash,
            lookback,
            1.5,
            params.news_weight,
            0.002,
            params.capital_fraction,
            params.max_order_size,
            params.cash_reserve,
            params.max_short,
        )));
        next_id += 1;
    }

    for i in 0..counts.noise {
        let symbol = pick_symbol(symbols, i as usize);
        let activity_prob = (reaction_dist.sample(&mut rng) / 10.0).clamp(0.01, 0.9);
        let cash = sample_cash(&mut rng);
        agents.push(Box::new(NoiseAgent::new(
            next_id,
            symbol,
            cash,
            activity_prob,
            0.3,
            0.3,
            0.01,
            params.capital_fraction,
            params.max_order_size,
            params.cash_reserve,
            params.max_short,
            seed.wrapping_add(next_id),
        )));
        next_id += 1;
    }

    for i in 0..counts.market_maker {
        let symbol = pick_symbol(symbols, i as usize);
        let cash = sample_cash(&mut rng) * 5.0;
        agents.push(Box::new(MarketMakerAgent::new(
            next_id,
            symbol,
            cash,
            mm.fundamental_weight,
            mm.base_spread_bps,
            mm.inventory_skew,
            mm.max_inventory,
            1.0,
            1.0,
            (params.max_order_size * 0.1).max(1.0),
        )));
        next_id += 1;
    }

    for i in 0..counts.supply_demand {
        let symbol = pick_symbol(symbols, i as usize);
        let cash = sample_cash(&mut rng);
        agents.push(Box::new(SupplyDemandAgent::new(
            next_id,
            symbol,
            cash,
            0.05,
            0.002,
            params.capital_fraction,
            params.max_order_size,
            params.cash_reserve,
            params.max_short,
        )));
        next_id += 1;
    }

    for i in 0..counts.cross_effects {
        let symbol = pick_symbol(symbols, i as usize);
        let peers: Vec<(String, f64)> = symbols
            .iter()
            .filter(|s| s.as_str() != symbol)
            .map(|s| (s.clone(), risk_dist.sample(&mut rng) * 0.1))
            .collect();
        let cash = sample_cash(&mut rng);
        agents.push(Box::new(CrossEffectsAgent::new(
            next_id,
            symbol,
            cash,
            peers,
            0.01,
            0.002,
            params.capital_fraction,
            params.max_order_size,
            params.cash_reserve,
            params.max_short,
        )));
        next_id += 1;
    }

    for i in 0..counts.inventory {
        let symbol = pick_symbol(symbols, i as usize);
        let target = Normal::new(0.0, params.max_short.max(1.0) * 0.2).unwrap().sample(&mut rng);
        let cash = sample_cash(&mut rng);
        agents.push(Box::new(InventoryAgent::new(
            next_id,
            symbol,
            cash,
            target,
            0.1,
            1.0,
            0.002,
            params.capital_fraction,
            params.max_order_size,
            params.cash_reserve,
            params.max_short,
        )));
        next_id += 1;
    }

    for i in 0..counts.event {
        let symbol = pick_symbol(symbols, i as usize);
        let cash = sample_cash(&mut rng);
        agents.push(Box::new(EventAgent::new(
            next_id,
            symbol,
            cash,
            0.1,
            0.002,
            params.capital_fraction,
            params.max_order_size,
            params.cash_reserve,
            params.max_short,
        )));
        next_id += 1;
    }

    agents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_size_matches_configured_counts() {
        let mut config = RuntimeConfig::default();
        config.agent_counts.fundamental = 3;
        config.agent_counts.momentum = 2;
        config.agent_counts.noise = 1;
        let symbols = vec!["A".to_string(), "B".to_string()];
        let agents = build_population(&config, &symbols, 42);
        assert_eq!(agents.len(), 6);
    }

    #[test]
    fn ids_are_assigned_in_stable_ascending_order() {
        let mut config = RuntimeConfig::default();
        config.agent_counts.fundamental = 2;
        config.agent_counts.noise = 2;
        let symbols = vec!["A".to_string()];
        let agents = build_population(&config, &symbols, 1);
        let ids: Vec<u64> = agents.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn same_seed_produces_identical_rosters() {
        let mut config = RuntimeConfig::default();
        config.agent_counts.momentum = 4;
        let symbols = vec!["A".to_string(), "B".to_string()];
        let a = build_population(&config, &symbols, 99);
        let b = build_population(&config, &symbols, 99);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.cash(), y.cash());
        }
    }

    #[test]
    fn empty_symbols_yields_no_agents() {
        let mut config = RuntimeConfig::default();
        config.agent_counts.fundamental = 5;
        let agents = build_population(&config, &[], 1);
        assert!(agents.is_empty());
    }
}
