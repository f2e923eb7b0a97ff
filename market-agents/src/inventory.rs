//! Trades to rebalance its position toward a configured target inventory
//! ratio, shrinking order size as a rolling volatility estimate rises.

use std::collections::VecDeque;

use market_core::agent::{Agent, MarketSnapshot};
use market_core::orderbook::{Order, OrderType, Side, Trade};

use crate::sizing::size_order;

const VOLATILITY_WINDOW: usize = 20;

pub struct InventoryAgent {
    id: u64,
    symbol: String,
    cash: f64,
    position: f64,
    target_inventory: f64,
    rebalance_threshold: f64,
    volatility_sensitivity: f64,
    offset_fraction: f64,
    capital_fraction: f64,
    max_order_size: f64,
    cash_reserve: f64,
    max_short: f64,
    history: VecDeque<f64>,
}

impl InventoryAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        cash: f64,
        target_inventory: f64,
        rebalance_threshold: f64,
        volatility_sensitivity: f64,
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
            target_inventory,
            rebalance_threshold,
            volatility_sensitivity,
            offset_fraction,
            capital_fraction,
            max_order_size,
            cash_reserve,
            max_short,
            history: VecDeque::new(),
        }
    }

    fn rolling_volatility(&self) -> f64 {
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

impl Agent for InventoryAgent {
    fn type_name(&self) -> &'static str {
        "inventory"
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn on_tick(&mut self, snapshot: &MarketSnapshot) -> Vec<Order> {
        let price = match snapshot.prices.get(&self.symbol) {
            Some(p) if *p > 0.0 => *p,
            _ => return Vec::new(),
        };

        if self.history.len() >= VOLATILITY_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(price);

        let deviation = self.target_inventory - self.position;
        let band = self.rebalance_threshold * self.target_inventory.abs().max(1.0);
        if deviation.abs() <= band {
            return Vec::new();
        }

        let side = if deviation > 0.0 { Side::Buy } else { Side::Sell };
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

        let volatility_damping = 1.0 / (1.0 + self.volatility_sensitivity * self.rolling_volatility());
        let qty = (qty * volatility_damping).min(deviation.abs()).max(1.0);

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
