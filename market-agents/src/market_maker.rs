//! Quotes symmetric bid/ask around a mid blended between the book and the
//! fundamental; spread widens with macro volatility and sentiment, and both
//! sides skew against accumulated inventory. Avellaneda-Stoikov-flavored but
//! simplified to a linear skew rather than a full optimal-control solution.

use std::collections::VecDeque;

use market_core::agent::{Agent, MarketSnapshot};
use market_core::orderbook::{Order, OrderType, Side, Trade};

const VOLATILITY_WINDOW: usize = 20;

pub struct MarketMakerAgent {
    id: u64,
    symbol: String,
    cash: f64,
    position: f64,
    fundamental_weight: f64,
    base_spread_bps: f64,
    inventory_skew: f64,
    max_inventory: f64,
    volatility_sensitivity: f64,
    sentiment_sensitivity: f64,
    quote_size: f64,
    history: VecDeque<f64>,
}

impl MarketMakerAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        cash: f64,
        fundamental_weight: f64,
        base_spread_bps: f64,
        inventory_skew: f64,
        max_inventory: f64,
        volatility_sensitivity: f64,
        sentiment_sensitivity: f64,
        quote_size: f64,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            cash,
            position: 0.0,
            fundamental_weight,
            base_spread_bps,
            inventory_skew,
            max_inventory,
            volatility_sensitivity,
            sentiment_sensitivity,
            quote_size,
            history: VecDeque::new(),
        }
    }

    fn volatility(&self) -> f64 {
        if self.history.len() < 3 {
            return 0.0;
        }
        let returns: Vec<f64> = self
            .history
            .iter()
            .collect::<Vec<_>>()
            .windows(2)
            .filter(|w| *w[0] > 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
        var.sqrt()
    }
}

impl Agent for MarketMakerAgent {
    fn type_name(&self) -> &'static str {
        "market_maker"
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
        let book_mid = snapshot.mid_price(&self.symbol);
        let book_mid = if book_mid > 0.0 { book_mid } else { price };

        if self.history.len() >= VOLATILITY_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(price);
        let volatility = self.volatility();

        let sentiment = snapshot.symbol_sentiment.get(&self.symbol).copied().unwrap_or(0.0) + snapshot.global_sentiment;

        let blended_mid = self.fundamental_weight * fundamental + (1.0 - self.fundamental_weight) * book_mid;
        let spread_frac = (self.base_spread_bps / 10_000.0)
            * (1.0 + self.volatility_sensitivity * volatility + self.sentiment_sensitivity * sentiment.abs());
        let half_spread = blended_mid * spread_frac / 2.0;

        let inventory_ratio = (self.position / self.max_inventory.max(1e-9)).clamp(-1.0, 1.0);
        let skew = self.inventory_skew * inventory_ratio * blended_mid;

        let mut orders = Vec::with_capacity(2);
        if self.position < self.max_inventory {
            let bid_price = (blended_mid - half_spread - skew).max(0.01);
            orders.push(Order::new(
                self.id,
                self.type_name(),
                self.symbol.clone(),
                Side::Buy,
                OrderType::Limit,
                bid_price,
                self.quote_size,
            ));
        }
        if self.position > -self.max_inventory {
            let ask_price = (blended_mid + half_spread - skew).max(0.01);
            orders.push(Order::new(
                self.id,
                self.type_name(),
                self.symbol.clone(),
                Side::Sell,
                OrderType::Limit,
                ask_price,
                self.quote_size,
            ));
        }
        orders
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
            fundamentals: HashMap::from([("A".to_string(), price)]),
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
    fn quotes_both_sides_when_flat() {
        let mut agent = MarketMakerAgent::new(1, "A", 100_000.0, 0.3, 10.0, 0.2, 1_000.0, 1.0, 1.0, 10.0);
        let orders = agent.on_tick(&snapshot(100.0));
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().any(|o| o.side == Side::Buy));
        assert!(orders.iter().any(|o| o.side == Side::Sell));
    }

    #[test]
    fn stops_buying_at_max_inventory() {
        let mut agent = MarketMakerAgent::new(1, "A", 100_000.0, 0.3, 10.0, 0.2, 100.0, 1.0, 1.0, 10.0);
        agent.position = 100.0;
        let orders = agent.on_tick(&snapshot(100.0));
        assert!(orders.iter().all(|o| o.side != Side::Buy));
    }

    #[test]
    fn bid_is_below_ask() {
        let mut agent = MarketMakerAgent::new(1, "A", 100_000.0, 0.3, 10.0, 0.2, 1_000.0, 1.0, 1.0, 10.0);
        let orders = agent.on_tick(&snapshot(100.0));
        let bid = orders.iter().find(|o| o.side == Side::Buy).unwrap().price;
        let ask = orders.iter().find(|o| o.side == Side::Sell).unwrap().price;
        assert!(bid < ask);
    }
}
