//! Trades on the commodity's current supply/demand imbalance rather than
//! price history: consumption exceeding production signals upward pressure.

use market_core::agent::{Agent, MarketSnapshot};
use market_core::orderbook::{Order, OrderType, Side, Trade};

use crate::sizing::size_order;

pub struct SupplyDemandAgent {
    id: u64,
    symbol: String,
    cash: f64,
    position: f64,
    threshold: f64,
    offset_fraction: f64,
    capital_fraction: f64,
    max_order_size: f64,
    cash_reserve: f64,
    max_short: f64,
}

impl SupplyDemandAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        cash: f64,
        threshold: f64,
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
            threshold,
            offset_fraction,
            capital_fraction,
            max_order_size,
            cash_reserve,
            max_short,
        }
    }
}

impl Agent for SupplyDemandAgent {
    fn type_name(&self) -> &'static str {
        "supply_demand"
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn on_tick(&mut self, snapshot: &MarketSnapshot) -> Vec<Order> {
        let price = match snapshot.prices.get(&self.symbol) {
            Some(p) if *p > 0.0 => *p,
            _ => return Vec::new(),
        };
        let imbalance = match snapshot.supply_demand.get(&self.symbol) {
            Some(sd) => sd.imbalance(),
            None => return Vec::new(),
        };
        if imbalance.abs() <= self.threshold {
            return Vec::new();
        }

        let side = if imbalance > 0.0 { Side::Buy } else { Side::Sell };
        let mid = snapshot.mid_price(&self.symbol).max(price);
        let limit_price = match side {
            Side::Buy => mid * (1.0 + self.offset_fraction),
            Side::Sell => mid * (1.0 - self.offset_fraction),
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
    use market_core::commodity::SupplyDemand;
    use std::collections::HashMap;

    fn snapshot(price: f64, sd: SupplyDemand) -> MarketSnapshot {
        MarketSnapshot {
            sim_time: 0,
            tick_scale: 1.0,
            prices: HashMap::from([("A".to_string(), price)]),
            fundamentals: HashMap::new(),
            supply_demand: HashMap::from([("A".to_string(), sd)]),
            best_bids: HashMap::from([("A".to_string(), price * 0.999)]),
            best_asks: HashMap::from([("A".to_string(), price * 1.001)]),
            recent_news: Vec::new(),
            global_sentiment: 0.0,
            industry_sentiment: HashMap::new(),
            symbol_sentiment: HashMap::new(),
        }
    }

    #[test]
    fn buys_when_consumption_exceeds_production() {
        let mut agent = SupplyDemandAgent::new(1, "A", 10_000.0, 0.05, 0.001, 0.1, 100.0, 0.1, 100.0);
        let sd = SupplyDemand::new(80.0, 120.0, 0.0, 0.0, 0.0);
        let orders = agent.on_tick(&snapshot(100.0, sd));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
    }

    #[test]
    fn flat_within_threshold() {
        let mut agent = SupplyDemandAgent::new(1, "A", 10_000.0, 0.5, 0.001, 0.1, 100.0, 0.1, 100.0);
        let sd = SupplyDemand::new(100.0, 101.0, 0.0, 0.0, 0.0);
        assert!(agent.on_tick(&snapshot(100.0, sd)).is_empty());
    }
}
