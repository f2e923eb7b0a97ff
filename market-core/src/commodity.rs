//! Per-instrument scalar state: price, supply/demand, circuit breaker.

use std::collections::VecDeque;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bounded price-history capacity (spec.md §3).
pub const MAX_PRICE_HISTORY: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyDemand {
    pub production: f64,
    pub consumption: f64,
    pub imports: f64,
    pub exports: f64,
    pub inventory: f64,
    pub base_production: f64,
    pub base_consumption: f64,
    pub base_inventory: f64,
}

impl SupplyDemand {
    pub fn new(production: f64, consumption: f64, imports: f64, exports: f64, inventory: f64) -> Self {
        Self {
            production,
            consumption,
            imports,
            exports,
            inventory,
            base_production: production,
            base_consumption: consumption,
            base_inventory: inventory,
        }
    }

    /// `(consumption - production) / mean(production, consumption)`, or `0`
    /// when the mean is non-positive. Imports/exports/inventory are
    /// deliberately excluded: a comment in the hypothetical reference
    /// asserts inventory must not create bias, and this is the formula
    /// spec.md's data-model invariant table states directly (see
    /// `DESIGN.md`, Open Question 3).
    pub fn imbalance(&self) -> f64 {
        let mean = (self.production + self.consumption) / 2.0;
        if mean > 0.0 {
            (self.consumption - self.production) / mean
        } else {
            0.0
        }
    }

    /// Mean-reverts production/consumption toward their base levels, adds
    /// Gaussian noise scaled by `sqrt(tick_scale)`, advances inventory by
    /// net flow, and mean-reverts inventory toward its base level.
    pub fn update(&mut self, tick_scale: f64, decay_rate: f64, noise_sigma: f64, rng: &mut impl Rng) {
        let decay = decay_rate.powf(tick_scale);
        let noise_scale = (tick_scale.max(0.0)).sqrt();
        let normal = Normal::new(0.0, noise_sigma * noise_scale).unwrap_or_else(|_| Normal::new(0.0, 1e-9).unwrap());

        self.production = (self.base_production + (self.production - self.base_production) * decay
            + normal.sample(rng))
        .max(0.0);
        self.consumption = (self.base_consumption + (self.consumption - self.base_consumption) * decay
            + normal.sample(rng))
        .max(0.0);

        self.inventory = (self.inventory + (self.production - self.consumption) * tick_scale).max(0.0);
        self.inventory =
            (self.base_inventory + (self.inventory - self.base_inventory) * decay).max(0.0);
    }

    pub fn apply_supply_shock(&mut self, magnitude: f64) {
        self.production = (self.production + self.base_production * magnitude).max(0.0);
    }

    pub fn apply_demand_shock(&mut self, magnitude: f64) {
        self.consumption = (self.consumption + self.base_consumption * magnitude).max(0.0);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub day_open_price: Option<f64>,
    pub broken: bool,
    pub max_daily_move: f64,
}

impl CircuitBreaker {
    pub fn new(max_daily_move: f64) -> Self {
        Self { day_open_price: None, broken: false, max_daily_move }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commodity {
    pub symbol: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub fundamental: f64,
    pub price_floor: f64,
    pub impact_dampening: f64,
    pub shock_clamp: f64,
    pub decay_rate: f64,
    pub daily_volume: f64,
    pub supply_demand_noise_sigma: f64,
    pub supply_demand: SupplyDemand,
    pub circuit_breaker: CircuitBreaker,
    price_history: VecDeque<f64>,
}

impl Commodity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        initial_price: f64,
        price_floor: f64,
        impact_dampening: f64,
        shock_clamp: f64,
        decay_rate: f64,
        max_daily_move: f64,
        supply_demand_noise_sigma: f64,
        supply_demand: SupplyDemand,
    ) -> Self {
        let mut history = VecDeque::with_capacity(MAX_PRICE_HISTORY);
        history.push_back(initial_price);
        Self {
            symbol: symbol.into(),
            name: name.into(),
            category: category.into(),
            price: initial_price,
            fundamental: initial_price,
            price_floor,
            impact_dampening,
            shock_clamp,
            decay_rate,
            daily_volume: 0.0,
            supply_demand_noise_sigma,
            supply_demand,
            circuit_breaker: CircuitBreaker::new(max_daily_move),
            price_history: history,
        }
    }

    /// Clamps to `price_floor` if non-positive; trips the circuit breaker if
    /// the move from day-open exceeds `max_daily_move`, clamping the price to
    /// the breaker band in that case. Always appends to the bounded history.
    pub fn set_price(&mut self, p: f64) {
        let mut price = if p <= 0.0 { self.price_floor } else { p };

        if let Some(open) = self.circuit_breaker.day_open_price {
            if open > 0.0 {
                let move_frac = (price / open - 1.0).abs();
                if move_frac > self.circuit_breaker.max_daily_move {
                    if !self.circuit_breaker.broken {
                        warn!(symbol = %self.symbol, move_frac, "circuit breaker tripped");
                    }
                    self.circuit_breaker.broken = true;
                    let band = self.circuit_breaker.max_daily_move;
                    price = if price >= open {
                        open * (1.0 + band)
                    } else {
                        open * (1.0 - band)
                    };
                }
            }
        }

        price = price.max(self.price_floor);
        self.price = price;
        if self.price_history.len() >= MAX_PRICE_HISTORY {
            self.price_history.pop_front();
        }
        self.price_history.push_back(price);
    }

    /// Blends the current price toward `trade_price` with a Kyle-lambda
    /// style dampening factor that decays in `sqrt(quantity)`, so no single
    /// small trade fully re-prices the commodity. A no-op while the circuit
    /// breaker is tripped.
    pub fn apply_trade_price(&mut self, trade_price: f64, qty: f64) {
        if self.circuit_breaker.broken {
            return;
        }
        let alpha = (self.impact_dampening / qty.max(1.0).sqrt()).min(0.5);
        let blended = self.price * (1.0 - alpha) + trade_price * alpha;
        self.set_price(blended);
    }

    pub fn update_supply_demand(&mut self, tick_scale: f64, rng: &mut impl Rng) {
        self.supply_demand.update(tick_scale, self.decay_rate, self.supply_demand_noise_sigma, rng);
    }

    pub fn apply_supply_shock(&mut self, magnitude: f64) {
        self.supply_demand.apply_supply_shock(magnitude);
    }

    pub fn apply_demand_shock(&mut self, magnitude: f64) {
        self.supply_demand.apply_demand_shock(magnitude);
    }

    pub fn mark_day_open(&mut self) {
        self.circuit_breaker.day_open_price = Some(self.price);
    }

    pub fn reset_circuit_breaker(&mut self) {
        self.circuit_breaker.broken = false;
    }

    pub fn get_return(&self, k: usize) -> f64 {
        let len = self.price_history.len();
        if len <= k {
            return 0.0;
        }
        let past = self.price_history[len - k - 1];
        if past == 0.0 {
            0.0
        } else {
            (self.price - past) / past
        }
    }

    /// Sample standard deviation of log returns over the last `window`
    /// prices.
    pub fn get_volatility_estimate(&self, window: usize) -> f64 {
        let len = self.price_history.len();
        if len < 2 {
            return 0.0;
        }
        let take = window.min(len - 1);
        if take == 0 {
            return 0.0;
        }
        let start = len - take - 1;
        let slice: Vec<f64> = self.price_history.iter().skip(start).copied().collect();
        let returns: Vec<f64> = slice
            .windows(2)
            .filter(|w| w[0] > 0.0 && w[1] > 0.0)
            .map(|w| (w[1] / w[0]).ln())
            .collect();
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
        var.sqrt()
    }

    pub fn price_history(&self) -> &VecDeque<f64> {
        &self.price_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn basic_commodity() -> Commodity {
        Commodity::new(
            "XAU",
            "Gold",
            "metal",
            100.0,
            1.0,
            0.1,
            0.05,
            0.98,
            0.1,
            0.5,
            SupplyDemand::new(100.0, 100.0, 0.0, 0.0, 500.0),
        )
    }

    #[test]
    fn price_never_drops_below_floor() {
        let mut c = basic_commodity();
        c.set_price(-5.0);
        assert_eq!(c.price, c.price_floor);
    }

    #[test]
    fn circuit_breaker_trips_and_clamps() {
        let mut c = basic_commodity();
        c.mark_day_open();
        c.set_price(200.0);
        assert!(c.circuit_breaker.broken);
        assert!((c.price - 110.0).abs() < 1e-9);
    }

    #[test]
    fn reset_circuit_breaker_allows_future_trips_again() {
        let mut c = basic_commodity();
        c.mark_day_open();
        c.set_price(200.0);
        assert!(c.circuit_breaker.broken);
        c.reset_circuit_breaker();
        assert!(!c.circuit_breaker.broken);
    }

    #[test]
    fn apply_trade_price_is_noop_while_broken() {
        let mut c = basic_commodity();
        c.mark_day_open();
        c.set_price(200.0);
        let before = c.price;
        c.apply_trade_price(150.0, 10.0);
        assert_eq!(c.price, before);
    }

    #[test]
    fn apply_trade_price_dampens_by_sqrt_quantity() {
        let mut c = basic_commodity();
        c.apply_trade_price(110.0, 100.0);
        let moved_large_qty = c.price;

        let mut c2 = basic_commodity();
        c2.apply_trade_price(110.0, 1.0);
        let moved_small_qty = c2.price;

        assert!(moved_small_qty - 100.0 > moved_large_qty - 100.0);
    }

    #[test]
    fn imbalance_ignores_inventory_and_trade_flows() {
        let sd = SupplyDemand::new(100.0, 120.0, 9999.0, 9999.0, 9999.0);
        assert!((sd.imbalance() - (20.0 / 110.0)).abs() < 1e-9);
    }

    #[test]
    fn imbalance_is_zero_when_mean_nonpositive() {
        let sd = SupplyDemand::new(0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(sd.imbalance(), 0.0);
    }

    #[test]
    fn update_supply_demand_keeps_inventory_nonnegative() {
        let mut sd = SupplyDemand::new(1.0, 1.0, 0.0, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            sd.update(1.0, 0.98, 0.5, &mut rng);
        }
        assert!(sd.inventory >= 0.0);
        assert!(sd.production >= 0.0);
        assert!(sd.consumption >= 0.0);
    }

    #[test]
    fn get_return_is_zero_without_enough_history() {
        let c = basic_commodity();
        assert_eq!(c.get_return(5), 0.0);
    }
}
