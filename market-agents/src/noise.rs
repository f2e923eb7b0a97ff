//! Emits a random market or limit order each tick with probability `p`, its
//! direction biased by current sentiment plus personal Gaussian noise.

use market_core::agent::{Agent, MarketSnapshot};
use market_core::orderbook::{Order, OrderType, Side, Trade};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::sizing::size_order;

pub struct NoiseAgent {
    id: u64,
    symbol: String,
    cash: f64,
    position: f64,
    activity_prob: f64,
    noise_sigma: f64,
    market_order_prob: f64,
    offset_fraction: f64,
    capital_fraction: f64,
    max_order_size: f64,
    cash_reserve: f64,
    max_short: f64,
    rng: StdRng,
}

impl NoiseAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        cash: f64,
        activity_prob: f64,
        noise_sigma: f64,
        market_order_prob: f64,
        offset_fraction: f64,
        capital_fraction: f64,
        max_order_size: f64,
        cash_reserve: f64,
        max_short: f64,
        seed: u64,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            cash,
            position: 0.0,
            activity_prob,
            noise_sigma,
            market_order_prob,
            offset_fraction,
            capital_fraction,
            max_order_size,
            cash_reserve,
            max_short,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Agent for NoiseAgent {
    fn type_name(&self) -> &'static str {
        "noise"
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn on_tick(&mut self, snapshot: &MarketSnapshot) -> Vec<Order> {
        if !self.rng.gen_bool(self.activity_prob.clamp(0.0, 1.0)) {
            return Vec::new();
        }
        let price = match snapshot.prices.get(&self.symbol) {
            Some(p) if *p > 0.0 => *p,
            _ => return Vec::new(),
        };

        let sentiment = snapshot.symbol_sentiment.get(&self.symbol).copied().unwrap_or(0.0) + snapshot.global_sentiment;
        let normal = Normal::new(sentiment, self.noise_sigma).unwrap_or_else(|_| Normal::new(0.0, 1e-6).unwrap());
        let draw = normal.sample(&mut self.rng);
        let side = if draw >= 0.0 { Side::Buy } else { Side::Sell };

        let is_market = self.rng.gen_bool(self.market_order_prob.clamp(0.0, 1.0));
        let mid = snapshot.mid_price(&self.symbol).max(price);
        let (order_type, limit_price) = if is_market {
            (OrderType::Market, 0.0)
        } else {
            let offset: f64 = self.rng.gen_range(-self.offset_fraction..self.offset_fraction);
            (OrderType::Limit, mid * (1.0 + offset))
        };
        let sizing_price = if is_market { mid } else { limit_price };

        let qty = match size_order(
            side,
            self.cash,
            self.position,
            sizing_price,
            self.capital_fraction,
            self.max_order_size,
            self.cash_reserve,
            self.max_short,
        ) {
            Some(q) => q,
            None => return Vec::new(),
        };

        vec![Order::new(self.id, self.type_name(), self.symbol.clone(), side, order_type, limit_price, qty)]
    }

    fn on_fill(&mut self, is_buyer: bool, trade: &Trade) {
        if trade.symbol != self.symbol {
            return;
        }
        let notional = trade.price * trade.quantity;
        if is_buyer {
            self.cash -= notional;
            self.position += trade.quantity;
        } else {
            self.cash += notional;
            self.position -= trade.quantity;
        }
    }

    fn cash(&self) -> f64 {
        self.cash
    }

    fn position(&self, symbol: &str) -> f64 {
        if symbol == self.symbol {
            self.position
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            sim_time: 0,
            tick_scale: 1.0,
            prices: HashMap::from([("A".to_string(), 100.0)]),
            fundamentals: HashMap::new(),
            supply_demand: HashMap::new(),
            best_bids: HashMap::from([("A".to_string(), 99.9)]),
            best_asks: HashMap::from([("A".to_string(), 100.1)]),
            recent_news: Vec::new(),
            global_sentiment: 0.0,
            industry_sentiment: HashMap::new(),
            symbol_sentiment: HashMap::new(),
        }
    }

    #[test]
    fn never_trades_with_zero_activity_probability() {
        let mut agent = NoiseAgent::new(1, "A", 10_000.0, 0.0, 0.5, 0.5, 0.01, 0.1, 100.0, 0.1, 100.0, 3);
        for _ in 0..20 {
            assert!(agent.on_tick(&snapshot()).is_empty());
        }
    }

    #[test]
    fn trades_eventually_with_full_activity_probability() {
        let mut agent = NoiseAgent::new(1, "A", 10_000.0, 1.0, 0.5, 0.5, 0.01, 0.1, 100.0, 0.1, 100.0, 3);
        let total: usize = (0..20).map(|_| agent.on_tick(&snapshot()).len()).sum();
        assert!(total > 0);
    }
}
