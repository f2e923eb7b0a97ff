//! Trades its target commodity off per-tick returns of a configured set of
//! other commodities, weighted by fixed cross-commodity coefficients.

use std::collections::HashMap;

use market_core::agent::{Agent, MarketSnapshot};
use market_core::orderbook::{Order, OrderType, Side, Trade};

use crate::sizing::size_order;

pub struct CrossEffectsAgent {
    id: u64,
    symbol: String,
    cash: f64,
    position: f64,
    /// `(peer symbol, coefficient)`; positive coefficient means a peer
    /// uptick pushes this agent toward buying its own symbol.
    coefficients: Vec<(String, f64)>,
    threshold: f64,
    offset_fraction: f64,
    capital_fraction: f64,
    max_order_size: f64,
    cash_reserve: f64,
    max_short: f64,
    last_peer_prices: HashMap<String, f64>,
}

impl CrossEffectsAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        cash: f64,
        coefficients: Vec<(String, f64)>,
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
            coefficients,
            threshold,
            offset_fraction,
            capital_fraction,
            max_order_size,
            cash_reserve,
            max_short,
            last_peer_prices: HashMap::new(),
        }
    }
}

impl Agent for CrossEffectsAgent {
    fn type_name(&self) -> &'static str {
        "cross_effects"
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn on_tick(&mut self, snapshot: &MarketSnapshot) -> Vec<Order> {
        let price = match snapshot.prices.get(&self.symbol) {
            Some(p) if *p > 0.0 => *p,
            _ => return Vec::new(),
        };

        let mut signal = 0.0;
        for (peer, coeff) in &self.coefficients {
            let Some(&peer_price) = snapshot.prices.get(peer) else { continue };
            if peer_price <= 0.0 {
                continue;
            }
            if let Some(&last) = self.last_peer_prices.get(peer) {
                if last > 0.0 {
                    signal += coeff * (peer_price - last) / last;
                }
            }
            self.last_peer_prices.insert(peer.clone(), peer_price);
        }

        if signal.abs() <= self.threshold {
            return Vec::new();
        }

        let side = if signal > 0.0 { Side::Buy } else { Side::Sell };
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

    fn snapshot(a: f64, b: f64) -> MarketSnapshot {
        MarketSnapshot {
            sim_time: 0,
            tick_scale: 1.0,
            prices: HashMap::from([("A".to_string(), a), ("B".to_string(), b)]),
            fundamentals: HashMap::new(),
            supply_demand: HashMap::new(),
            best_bids: HashMap::from([("A".to_string(), a * 0.999)]),
            best_asks: HashMap::from([("A".to_string(), a * 1.001)]),
            recent_news: Vec::new(),
            global_sentiment: 0.0,
            industry_sentiment: HashMap::new(),
            symbol_sentiment: HashMap::new(),
        }
    }

    #[test]
    fn first_tick_never_trades_without_a_prior_peer_price() {
        let mut agent =
            CrossEffectsAgent::new(1, "A", 10_000.0, vec![("B".to_string(), 1.0)], 0.01, 0.001, 0.1, 100.0, 0.1, 100.0);
        assert!(agent.on_tick(&snapshot(100.0, 50.0)).is_empty());
    }

    #[test]
    fn buys_when_positively_correlated_peer_jumps() {
        let mut agent =
            CrossEffectsAgent::new(1, "A", 10_000.0, vec![("B".to_string(), 1.0)], 0.01, 0.001, 0.1, 100.0, 0.1, 100.0);
        agent.on_tick(&snapshot(100.0, 50.0));
        let orders = agent.on_tick(&snapshot(100.0, 60.0));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
    }
}
