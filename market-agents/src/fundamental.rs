//! Compares price to fundamental value and trades toward it when the
//! mispricing, adjusted by sentiment, exceeds a personal threshold.

use market_core::agent::{Agent, MarketSnapshot};
use market_core::orderbook::{Order, OrderType, Side, Trade};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sizing::size_order;

pub struct FundamentalAgent {
    id: u64,
    symbol: String,
    cash: f64,
    position: f64,
    threshold: f64,
    offset_fraction: f64,
    news_weight: f64,
    capital_fraction: f64,
    max_order_size: f64,
    cash_reserve: f64,
    max_short: f64,
    rng: StdRng,
}

impl FundamentalAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        cash: f64,
        threshold: f64,
        offset_fraction: f64,
        news_weight: f64,
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
            threshold,
            offset_fraction,
            news_weight,
            capital_fraction,
            max_order_size,
            cash_reserve,
            max_short,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Agent for FundamentalAgent {
    fn type_name(&self) -> &'static str {
        "fundamental"
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn on_tick(&mut self, snapshot: &MarketSnapshot) -> Vec<Order> {
        let price = match snapshot.prices.get(&self.symbol) {
            Some(p) if *p > 0.0 => *p,
            _ => return Vec::new(),
        };
        let fundamental = snapshot.fundamentals.get(&self.symbol).copied().unwrap_or(price);
        let sentiment = snapshot.symbol_sentiment.get(&self.symbol).copied().unwrap_or(0.0) + snapshot.global_sentiment;

        let mispricing = (fundamental - price) / price + self.news_weight * sentiment;
        if mispricing.abs() <= self.threshold {
            return Vec::new();
        }

        let side = if mispricing > 0.0 { Side::Buy } else { Side::Sell };
        let mid = snapshot.mid_price(&self.symbol).max(price);
        let offset: f64 = self.rng.gen_range(0.0..self.offset_fraction);
        let signed_offset = if side == Side::Buy { offset } else { -offset };
        let limit_price = mid * (1.0 + signed_offset);

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

    fn snapshot(price: f64, fundamental: f64) -> MarketSnapshot {
        MarketSnapshot {
            sim_time: 0,
            tick_scale: 1.0,
            prices: HashMap::from([("A".to_string(), price)]),
            fundamentals: HashMap::from([("A".to_string(), fundamental)]),
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
    fn stays_flat_within_threshold() {
        let mut agent = FundamentalAgent::new(1, "A", 10_000.0, 0.05, 0.01, 0.1, 0.1, 100.0, 0.1, 100.0, 7);
        assert!(agent.on_tick(&snapshot(100.0, 101.0)).is_empty());
    }

    #[test]
    fn buys_when_fundamental_well_above_price() {
        let mut agent = FundamentalAgent::new(1, "A", 10_000.0, 0.02, 0.01, 0.1, 0.1, 100.0, 0.1, 100.0, 7);
        let orders = agent.on_tick(&snapshot(100.0, 120.0));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
    }

    #[test]
    fn sells_when_fundamental_well_below_price() {
        let mut agent = FundamentalAgent::new(1, "A", 10_000.0, 0.02, 0.01, 0.1, 0.1, 100.0, 0.1, 100.0, 7);
        let orders = agent.on_tick(&snapshot(100.0, 80.0));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Sell);
    }

    #[test]
    fn on_fill_updates_cash_and_position() {
        let mut agent = FundamentalAgent::new(1, "A", 1_000.0, 0.02, 0.01, 0.1, 0.1, 100.0, 0.1, 100.0, 7);
        let trade = Trade {
            buy_order_id: 1,
            sell_order_id: 2,
            buyer_agent_id: 1,
            seller_agent_id: 2,
            buyer_agent_type: "fundamental".into(),
            seller_agent_type: "noise".into(),
            symbol: "A".into(),
            price: 10.0,
            quantity: 5.0,
            timestamp: 0,
        };
        agent.on_fill(true, &trade);
        assert_eq!(agent.cash, 950.0);
        assert_eq!(agent.position("A"), 5.0);
    }
}
