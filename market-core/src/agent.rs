//! The polymorphic agent capability set and the per-tick market snapshot
//! agents observe.

use std::collections::HashMap;

use crate::commodity::SupplyDemand;
use crate::news::NewsEvent;
use crate::orderbook::{Order, Trade};

/// Read-only, per-tick view of market state built once per tick and handed
/// to every agent in a fixed, seeded-deterministic order. Agents never hold
/// a long-lived borrow of engine state; this snapshot is their only window
/// into it.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub sim_time: i64,
    pub tick_scale: f64,
    pub prices: HashMap<String, f64>,
    pub fundamentals: HashMap<String, f64>,
    pub supply_demand: HashMap<String, SupplyDemand>,
    pub best_bids: HashMap<String, f64>,
    pub best_asks: HashMap<String, f64>,
    pub recent_news: Vec<NewsEvent>,
    pub global_sentiment: f64,
    pub industry_sentiment: HashMap<String, f64>,
    pub symbol_sentiment: HashMap<String, f64>,
}

impl MarketSnapshot {
    pub fn mid_price(&self, symbol: &str) -> f64 {
        let bid = self.best_bids.get(symbol).copied().unwrap_or(0.0);
        let ask = self.best_asks.get(symbol).copied().unwrap_or(0.0);
        match (bid > 0.0, ask > 0.0) {
            (true, true) => (bid + ask) / 2.0,
            (true, false) => bid,
            (false, true) => ask,
            (false, false) => self.prices.get(symbol).copied().unwrap_or(0.0),
        }
    }
}

/// Shared behavior table every concrete trader kind implements. Modeled as a
/// tagged trait-object family (`Box<dyn Agent>`) rather than deep
/// inheritance, per spec.md §9's re-architecture note.
pub trait Agent: Send {
    fn type_name(&self) -> &'static str;
    fn id(&self) -> u64;

    /// Returns zero or more orders to submit this tick. Must not block and
    /// must not panic on bad input; the engine treats a panic as a dropped
    /// tick for this agent (logged, orders discarded), but well-behaved
    /// agents should simply return an empty `Vec` instead.
    fn on_tick(&mut self, snapshot: &MarketSnapshot) -> Vec<Order>;

    /// Notifies the agent of a fill in which it was either the buyer or the
    /// seller. `is_buyer` tells which side of `trade` this agent was on.
    fn on_fill(&mut self, is_buyer: bool, trade: &Trade);

    fn cash(&self) -> f64;
    fn position(&self, symbol: &str) -> f64;
}
