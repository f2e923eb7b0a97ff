//! Minimal deterministic fixtures: a config with a short, fast day, two
//! commodities, and an agent double that never trades.

use crate::agent::{Agent, MarketSnapshot};
use crate::clock::SimClock;
use crate::commodity::{Commodity, SupplyDemand};
use crate::config::RuntimeConfig;
use crate::orderbook::Trade;

/// An `Agent` that observes every tick and fill but never submits an order.
/// Useful as filler population in tests that only care about commodity or
/// order-book behavior.
pub struct NoopAgent {
    id: u64,
}

impl NoopAgent {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

impl Agent for NoopAgent {
    fn type_name(&self) -> &'static str {
        "noop"
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn on_tick(&mut self, _snapshot: &MarketSnapshot) -> Vec<crate::orderbook::Order> {
        Vec::new()
    }

    fn on_fill(&mut self, _is_buyer: bool, _trade: &Trade) {}

    fn cash(&self) -> f64 {
        0.0
    }

    fn position(&self, _symbol: &str) -> f64 {
        0.0
    }
}

/// A config with a short day (10 ticks) so tests can cross day boundaries
/// and hit every candle interval without iterating thousands of ticks.
pub fn test_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.engine.ticks_per_day = 10;
    config.engine.reference_ticks_per_day = 10;
    config.simulation.tick_rate_ms = 1;
    config
}

pub fn test_commodity(symbol: &str, initial_price: f64, config: &RuntimeConfig) -> Commodity {
    Commodity::new(
        symbol,
        symbol,
        "test",
        initial_price,
        config.asset_defaults.price_floor,
        config.asset_defaults.impact_dampening,
        config.asset_defaults.shock_clamp,
        config.asset_defaults.decay_rate,
        config.asset_defaults.max_daily_move,
        config.asset_defaults.supply_demand_noise_sigma,
        SupplyDemand::new(initial_price, initial_price, 0.0, 0.0, initial_price * 5.0),
    )
}

/// Two commodities (`"A"` at 100.0, `"B"` at 50.0) and two `NoopAgent`s,
/// starting `2024-01-01`.
pub fn test_world(config: &RuntimeConfig) -> (SimClock, Vec<Commodity>, Vec<Box<dyn Agent>>) {
    let clock = SimClock::new("2024-01-01", config.engine.ticks_per_day, config.engine.reference_ticks_per_day)
        .expect("fixture date is well-formed");
    let commodities = vec![test_commodity("A", 100.0, config), test_commodity("B", 50.0, config)];
    let agents: Vec<Box<dyn Agent>> = vec![Box::new(NoopAgent::new(1)), Box::new(NoopAgent::new(2))];
    (clock, commodities, agents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MarketEngine;

    #[test]
    fn test_world_builds_a_working_engine() {
        let config = test_config();
        let (clock, commodities, agents) = test_world(&config);
        let mut engine = MarketEngine::new(clock, commodities, agents, config, 7);
        for _ in 0..15 {
            engine.tick();
        }
        assert_eq!(engine.clock().total_ticks(), 15);
        assert!(engine.commodities().contains_key("A"));
    }
}
