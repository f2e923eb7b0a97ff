//! Trades against the z-score of price relative to a rolling per-agent
//! lookback window; sentiment widens or narrows the trigger threshold.

use std::collections::VecDeque;

use market_core::agent::{Agent, MarketSnapshot};
use market_core::orderbook::{Order, OrderType, Side, Trade};

use crate::sizing::size_order;

pub struct MeanReversionAgent {
    id: u64,
    symbol: String,
    cash: f64,
    position: f64,
    lookback: usize,
    threshold: f64,
    sentiment_sensitivity: f64,
    offset_fraction: f64,
    capital_fraction: f64,
    max_order_size: f64,
    cash_reserve: f64,
    max_short: f64,
    history: VecDeque<f64>,
}

impl MeanReversionAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        cash: f64,
        lookback: usize,
        threshold: f64,
        sentiment_sensitivity: f64,
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
            lookback: lookback.max(2),
            threshold,
            sentiment_sensitivity,
            offset_fraction,
            capital_fraction,
            max_order_size,
            cash_reserve,
            max_short,
            history: VecDeque::new(),
        }
    }

    fn z_score(&self, price: f64) -> Option<f64> {
        if self.history.len() < self.lookback {
            return None;
        }
        let mean = self.history.iter().sum::<f64>() / self.history.len() as f64;
        let var = self.history.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / self.history.len() as f64;
        let std = var.sqrt();
        if std <= 1e-9 {
            None
        } else {
            Some((price - mean) / std)
        }
    }
}

impl Agent for MeanReversionAgent {
    fn type_name(&self) -> &'static str {
        "mean_reversion"
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn on_tick(&mut self, snapshot: &MarketSnapshot) -> Vec<Order> {
        let price = match snapshot.prices.get(&self.symbol) {
            Some(p) if *p > 0.0 => *p,
            _ => return Vec::new(),
        };

        let z = self.z_score(price);

        if self.history.len() >= self.lookback {
            self.history.pop_front();
        }
        self.history.push_back(price);

        let z = match z {
            Some(z) => z,
            None => return Vec::new(),
        };

        let sentiment = snapshot.symbol_sentiment.get(&self.symbol).copied().unwrap_or(0.0);
        let effective_threshold = (self.threshold - sentiment * self.sentiment_sensitivity).max(0.0);

        let side = if z < -effective_threshold {
            Side::Buy
        } else if z > effective_threshold {
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
    fn buys_on_a_sharp_downward_spike() {
        let mut agent = MeanReversionAgent::new(1, "A", 10_000.0, 5, 1.0, 0.0, 0.001, 0.1, 100.0, 0.1, 100.0);
        let mut last = Vec::new();
        for p in [100.0, 100.5, 99.5, 100.2, 99.8, 80.0] {
            last = agent.on_tick(&snapshot(p));
        }
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].side, Side::Buy);
    }

    #[test]
    fn stays_flat_without_enough_history() {
        let mut agent = MeanReversionAgent::new(1, "A", 10_000.0, 5, 1.0, 0.0, 0.001, 0.1, 100.0, 0.1, 100.0);
        assert!(agent.on_tick(&snapshot(100.0)).is_empty());
    }
}
