//! Crosses a short moving average over a long one and trades in the
//! direction of the cross, risk-scaled.

use std::collections::VecDeque;

use market_core::agent::{Agent, MarketSnapshot};
use market_core::orderbook::{Order, OrderType, Side, Trade};

use crate::sizing::size_order;

pub struct MomentumAgent {
    id: u64,
    symbol: String,
    cash: f64,
    position: f64,
    short_window: usize,
    long_window: usize,
    threshold: f64,
    risk_aversion: f64,
    offset_fraction: f64,
    capital_fraction: f64,
    max_order_size: f64,
    cash_reserve: f64,
    max_short: f64,
    history: VecDeque<f64>,
}

impl MomentumAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        cash: f64,
        short_window: usize,
        long_window: usize,
        threshold: f64,
        risk_aversion: f64,
        offset_fraction: f64,
        capital_fraction: f64,
        max_order_size: f64,
        cash_reserve: f64,
        max_short: f64,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            cash,
            position: 0.0,
            short_window: short_window.max(1),
            long_window: long_window.max(2),
            threshold,
            risk_aversion,
            offset_fraction,
            capital_fraction,
            max_order_size,
            cash_reserve,
            max_short,
            history: VecDeque::new(),
        }
    }

    fn moving_average(&self, window: usize) -> f64 {
        let take = window.min(self.history.len());
        let sum: f64 = self.history.iter().rev().take(take).sum();
        sum / take as f64
    }
}

impl Agent for MomentumAgent {
    fn type_name(&self) -> &'static str {
        "momentum"
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn on_tick(&mut self, snapshot: &MarketSnapshot) -> Vec<Order> {
        let price = match snapshot.prices.get(&self.symbol) {
            Some(p) if *p > 0.0 => *p,
            _ => return Vec::new(),
        };

        if self.history.len() >= self.long_window * 2 {
            self.history.pop_front();
        }
        self.history.push_back(price);

        if self.history.len() < self.long_window {
            return Vec::new();
        }

        let short_ma = self.moving_average(self.short_window);
        let long_ma = self.moving_average(self.long_window);
        if long_ma <= 0.0 {
            return Vec::new();
        }
        let diff = (short_ma - long_ma) / long_ma;
        let scaled_threshold = self.threshold * self.risk_aversion.max(1e-6);

        let side = if diff > scaled_threshold {
            Side::Buy
        } else if diff < -scaled_threshold {
            Side::Sell
        } else {
            return Vec::new();
        };

        let mid = snapshot.mid_price(&self.symbol).max(price);
        let limit_price = match side {
            Side::Buy => mid * (1.0 - self.offset_fraction),
            Side::Sell => mid * (1.0 + self.offset_fraction),
        };

        let qty = match size_order(
            side,
            self.cash,
            self.position,
            limit_price,
            self.capital_fraction,
            self.max_order_size,
            self.cash_reserve,
            self.max_short,
        ) {
            Some(q) => q,
            None => return Vec::new(),
        };

        vec![Order::new(self.id, self.type_name(), self.symbol.clone(), side, OrderType::Limit, limit_price, qty)]
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

    fn snapshot(price: f64) -> MarketSnapshot {
        MarketSnapshot {
            sim_time: 0,
            tick_scale: 1.0,
            prices: HashMap::from([("A".to_string(), price)]),
            fundamentals: HashMap::new(),
            supply_demand: HashMap::new(),
            best_bids: HashMap::from([("A".to_string(), price * 0.999)]),
            best_asks: HashMap::from([("A".to_string(), price * 1.001)]),
            recent_news: Vec::new(),
            global_sentiment: 0.0,
            industry_sentiment: HashMap::new(),
            symbol_sentiment: HashMap::new(),
        }
    }

    #[test]
    fn stays_flat_without_enough_history() {
        let mut agent = MomentumAgent::new(1, "A", 10_000.0, 3, 10, 0.01, 1.0, 0.001, 0.1, 100.0, 0.1, 100.0);
        assert!(agent.on_tick(&snapshot(100.0)).is_empty());
    }

    #[test]
    fn buys_on_sustained_uptrend() {
        let mut agent = MomentumAgent::new(1, "A", 10_000.0, 3, 10, 0.001, 1.0, 0.001, 0.1, 100.0, 0.1, 100.0);
        let mut last = Vec::new();
        for i in 0..15 {
            last = agent.on_tick(&snapshot(100.0 + i as f64 * 2.0));
        }
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].side, Side::Buy);
    }
}
