//! Price-time-priority limit order book and matching engine for one symbol.

use std::cmp::Ordering;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Default order expiry: 4 hours of simulated time.
///
/// One branch of the hypothetical reference described this as "2 simulated
/// days" elsewhere; that figure is treated as stale and this smaller,
/// operationally plausible value is the one actually shipped (see
/// `DESIGN.md`).
pub const DEFAULT_MAX_ORDER_AGE_MS: i64 = 14_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub agent_id: u64,
    pub agent_type: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// `0.0` for market orders.
    pub price: f64,
    pub quantity: f64,
    pub timestamp: i64,
    pub active: bool,
}

impl Order {
    /// Builds an order with `id = 0` (assigned by the book on insert) and
    /// `timestamp = 0` (stamped by the book on insert).
    pub fn new(
        agent_id: u64,
        agent_type: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        price: f64,
        quantity: f64,
    ) -> Self {
        Self {
            id: 0,
            agent_id,
            agent_type: agent_type.into(),
            symbol: symbol.into(),
            side,
            order_type,
            price,
            quantity,
            timestamp: 0,
            active: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub buy_order_id: u64,
    pub sell_order_id: u64,
    pub buyer_agent_id: u64,
    pub seller_agent_id: u64,
    pub buyer_agent_type: String,
    pub seller_agent_type: String,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub quantity: f64,
    pub order_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread: f64,
    pub mid: f64,
}

struct BookState {
    bids: Vec<Order>,
    asks: Vec<Order>,
    next_id: u64,
}

/// Price-time-priority matching engine for a single symbol.
///
/// Called exclusively while the engine's write lock is held; the internal
/// mutex exists only so reader paths (snapshots) taken alongside a
/// concurrent match never observe a torn book, per spec.md §4.2/§5.
pub struct OrderBook {
    symbol: String,
    state: Mutex<BookState>,
    max_order_age_ms: i64,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: Mutex::new(BookState { bids: Vec::new(), asks: Vec::new(), next_id: 1 }),
            max_order_age_ms: DEFAULT_MAX_ORDER_AGE_MS,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn set_max_order_age_ms(&mut self, ms: i64) {
        self.max_order_age_ms = ms;
    }

    /// Assigns an id if the order has none, stamps `now_ms` as its timestamp,
    /// validates, and inserts it maintaining price-time priority order.
    pub fn add_order(&self, mut order: Order, now_ms: i64) -> Result<u64, OrderError> {
        if order.quantity <= 0.0 {
            return Err(OrderError::NonPositiveQuantity(order.quantity));
        }
        if matches!(order.order_type, OrderType::Limit) && order.price <= 0.0 {
            return Err(OrderError::InvalidLimitPrice(order.price));
        }

        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        order.id = id;
        order.timestamp = now_ms;
        order.active = true;

        match order.side {
            Side::Buy => {
                let pos = state
                    .bids
                    .iter()
                    .position(|o| bid_priority(&order, o) == Ordering::Less)
                    .unwrap_or(state.bids.len());
                state.bids.insert(pos, order);
            }
            Side::Sell => {
                let pos = state
                    .asks
                    .iter()
                    .position(|o| ask_priority(&order, o) == Ordering::Less)
                    .unwrap_or(state.asks.len());
                state.asks.insert(pos, order);
            }
        }

        Ok(id)
    }

    /// Marks an order inactive. Returns `false` if unknown or already
    /// inactive; never mutates the book in that case.
    pub fn cancel_order(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        for o in state.bids.iter_mut().chain(state.asks.iter_mut()) {
            if o.id == id {
                if !o.active {
                    return false;
                }
                o.active = false;
                return true;
            }
        }
        false
    }

    /// Repeatedly matches the crossable front of both sides, emitting trades
    /// until neither side can cross. `now_ms` is used both as the trade
    /// timestamp and to evaluate lazy expiry of resting orders.
    pub fn matching(&self, now_ms: i64) -> Vec<Trade> {
        let mut state = self.state.lock();
        let mut trades = Vec::new();

        loop {
            if !pop_stale_front(&mut state.bids, self.max_order_age_ms, now_ms) {
                break;
            }
            if !pop_stale_front(&mut state.asks, self.max_order_age_ms, now_ms) {
                break;
            }

            let crossed = {
                let bid = &state.bids[0];
                let ask = &state.asks[0];
                matches!(bid.order_type, OrderType::Market)
                    || matches!(ask.order_type, OrderType::Market)
                    || bid.price >= ask.price
            };
            if !crossed {
                break;
            }

            let price = {
                let bid = &state.bids[0];
                let ask = &state.asks[0];
                execution_price(bid, ask)
            };
            let qty = state.bids[0].quantity.min(state.asks[0].quantity);

            {
                let bid = &state.bids[0];
                let ask = &state.asks[0];
                trades.push(Trade {
                    buy_order_id: bid.id,
                    sell_order_id: ask.id,
                    buyer_agent_id: bid.agent_id,
                    seller_agent_id: ask.agent_id,
                    buyer_agent_type: bid.agent_type.clone(),
                    seller_agent_type: ask.agent_type.clone(),
                    symbol: self.symbol.clone(),
                    price,
                    quantity: qty,
                    timestamp: now_ms,
                });
            }

            state.bids[0].quantity -= qty;
            state.asks[0].quantity -= qty;
            if state.bids[0].quantity <= 0.0 {
                state.bids.remove(0);
            }
            if state.asks[0].quantity <= 0.0 {
                state.asks.remove(0);
            }
        }

        trades
    }

    pub fn best_bid(&self) -> f64 {
        let state = self.state.lock();
        state.bids.iter().find(|o| o.active).map(|o| o.price).unwrap_or(0.0)
    }

    pub fn best_ask(&self) -> f64 {
        let state = self.state.lock();
        state.asks.iter().find(|o| o.active).map(|o| o.price).unwrap_or(0.0)
    }

    pub fn spread(&self) -> f64 {
        let (bid, ask) = (self.best_bid(), self.best_ask());
        if bid > 0.0 && ask > 0.0 {
            ask - bid
        } else {
            0.0
        }
    }

    pub fn mid_price(&self) -> f64 {
        let (bid, ask) = (self.best_bid(), self.best_ask());
        match (bid > 0.0, ask > 0.0) {
            (true, true) => (bid + ask) / 2.0,
            (true, false) => bid,
            (false, true) => ask,
            (false, false) => 0.0,
        }
    }

    /// Aggregated top-`depth` levels per side, price-sorted, quantities
    /// summed across orders resting at that price.
    pub fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        let state = self.state.lock();
        let bids = aggregate_levels(&state.bids, depth);
        let asks = aggregate_levels(&state.asks, depth);
        drop(state);

        let best_bid = bids.first().map(|l| l.price).unwrap_or(0.0);
        let best_ask = asks.first().map(|l| l.price).unwrap_or(0.0);
        let spread = if best_bid > 0.0 && best_ask > 0.0 { best_ask - best_bid } else { 0.0 };
        let mid = match (best_bid > 0.0, best_ask > 0.0) {
            (true, true) => (best_bid + best_ask) / 2.0,
            (true, false) => best_bid,
            (false, true) => best_ask,
            (false, false) => 0.0,
        };

        OrderBookSnapshot { symbol: self.symbol.clone(), bids, asks, best_bid, best_ask, spread, mid }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.bids.clear();
        state.asks.clear();
        state.next_id = 1;
    }
}

/// Ordering for bid-side insertion: higher price first, earlier timestamp
/// first among ties. Returns `Less` when `new` has lower priority than
/// `existing` (i.e. `new` belongs after `existing`).
fn bid_priority(new: &Order, existing: &Order) -> Ordering {
    match existing.price.partial_cmp(&new.price).unwrap_or(Ordering::Equal) {
        Ordering::Equal => new.timestamp.cmp(&existing.timestamp),
        other => other,
    }
}

/// Ordering for ask-side insertion: lower price first, earlier timestamp
/// first among ties.
fn ask_priority(new: &Order, existing: &Order) -> Ordering {
    match new.price.partial_cmp(&existing.price).unwrap_or(Ordering::Equal) {
        Ordering::Equal => new.timestamp.cmp(&existing.timestamp),
        other => other,
    }
}

/// Discards inactive or expired orders from the front of `side`. Returns
/// `false` if the side is empty after discarding (nothing left to match).
fn pop_stale_front(side: &mut Vec<Order>, max_age_ms: i64, now_ms: i64) -> bool {
    loop {
        match side.first() {
            None => return false,
            Some(front) => {
                let expired = now_ms - front.timestamp > max_age_ms;
                if !front.active || expired {
                    side.remove(0);
                    continue;
                }
                return true;
            }
        }
    }
}

/// Execution price: the resting side's price. Market orders carry no usable
/// price of their own, so the opposite (limit) side's price is used; between
/// two limit orders, the earlier-timestamped one is resting.
fn execution_price(bid: &Order, ask: &Order) -> f64 {
    match (bid.order_type, ask.order_type) {
        (OrderType::Market, _) => ask.price,
        (_, OrderType::Market) => bid.price,
        _ => {
            if bid.timestamp <= ask.timestamp {
                bid.price
            } else {
                ask.price
            }
        }
    }
}

fn aggregate_levels(orders: &[Order], depth: usize) -> Vec<OrderBookLevel> {
    let mut levels: Vec<OrderBookLevel> = Vec::new();
    for o in orders.iter().filter(|o| o.active) {
        match levels.last_mut() {
            Some(last) if (last.price - o.price).abs() < f64::EPSILON => {
                last.quantity += o.quantity;
                last.order_count += 1;
            }
            _ => {
                if levels.len() == depth {
                    break;
                }
                levels.push(OrderBookLevel { price: o.price, quantity: o.quantity, order_count: 1 });
            }
        }
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(side: Side, price: f64, qty: f64) -> Order {
        Order::new(1, "test", "XAU", side, OrderType::Limit, price, qty)
    }

    #[test]
    fn scenario_single_tick_uncrossed_book() {
        let book = OrderBook::new("XAU");
        book.add_order(limit(Side::Buy, 99.0, 10.0), 0).unwrap();
        book.add_order(limit(Side::Sell, 101.0, 10.0), 1).unwrap();

        assert!(book.matching(2).is_empty());
        assert_eq!(book.best_bid(), 99.0);
        assert_eq!(book.best_ask(), 101.0);
        assert_eq!(book.spread(), 2.0);
        assert_eq!(book.mid_price(), 100.0);
    }

    #[test]
    fn scenario_crossed_match_with_price_time_priority() {
        let book = OrderBook::new("XAU");
        let mut buy = limit(Side::Buy, 105.0, 10.0);
        buy.agent_id = 1;
        let mut sell = limit(Side::Sell, 100.0, 10.0);
        sell.agent_id = 2;
        book.add_order(buy, 0).unwrap();
        book.add_order(sell, 5).unwrap();

        let trades = book.matching(10);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, 105.0);
        assert_eq!(trades[0].quantity, 10.0);
        assert_eq!(trades[0].buyer_agent_id, 1);
        assert_eq!(trades[0].seller_agent_id, 2);
    }

    #[test]
    fn scenario_partial_fill() {
        let book = OrderBook::new("XAU");
        book.add_order(limit(Side::Buy, 105.0, 15.0), 0).unwrap();
        book.add_order(limit(Side::Sell, 100.0, 10.0), 1).unwrap();

        let trades = book.matching(2);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity, 10.0);
        assert_eq!(book.best_bid(), 105.0);

        let snap = book.snapshot(5);
        assert_eq!(snap.bids[0].quantity, 5.0);
    }

    #[test]
    fn scenario_sweep_market_order() {
        let book = OrderBook::new("XAU");
        book.add_order(limit(Side::Sell, 100.0, 5.0), 0).unwrap();
        book.add_order(limit(Side::Sell, 101.0, 5.0), 1).unwrap();
        book.add_order(limit(Side::Sell, 102.0, 5.0), 2).unwrap();
        book.add_order(Order::new(9, "test", "XAU", Side::Buy, OrderType::Market, 0.0, 12.0), 3)
            .unwrap();

        let trades = book.matching(4);
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].price, 100.0);
        assert_eq!(trades[0].quantity, 5.0);
        assert_eq!(trades[1].price, 101.0);
        assert_eq!(trades[1].quantity, 5.0);
        assert_eq!(trades[2].price, 102.0);
        assert_eq!(trades[2].quantity, 2.0);
    }

    #[test]
    fn rejects_invalid_orders() {
        let book = OrderBook::new("XAU");
        assert_eq!(
            book.add_order(limit(Side::Buy, 100.0, 0.0), 0).unwrap_err(),
            OrderError::NonPositiveQuantity(0.0)
        );
        assert_eq!(
            book.add_order(limit(Side::Buy, 0.0, 10.0), 0).unwrap_err(),
            OrderError::InvalidLimitPrice(0.0)
        );
    }

    #[test]
    fn cancel_unknown_id_returns_false_and_does_not_mutate() {
        let book = OrderBook::new("XAU");
        book.add_order(limit(Side::Buy, 99.0, 10.0), 0).unwrap();
        assert!(!book.cancel_order(999));
        assert_eq!(book.best_bid(), 99.0);
    }

    #[test]
    fn cancelled_order_is_skipped_by_matching() {
        let book = OrderBook::new("XAU");
        let id = book.add_order(limit(Side::Buy, 105.0, 10.0), 0).unwrap();
        book.cancel_order(id);
        book.add_order(limit(Side::Sell, 100.0, 10.0), 1).unwrap();
        assert!(book.matching(2).is_empty());
    }

    #[test]
    fn expired_order_is_skipped_not_matched() {
        let mut book = OrderBook::new("XAU");
        book.set_max_order_age_ms(100);
        book.add_order(limit(Side::Buy, 105.0, 10.0), 0).unwrap();
        book.add_order(limit(Side::Sell, 100.0, 10.0), 1_000).unwrap();
        assert!(book.matching(1_000).is_empty());
        assert_eq!(book.best_bid(), 0.0);
    }

    #[test]
    fn earlier_inserted_order_at_same_price_fills_first() {
        let book = OrderBook::new("XAU");
        let mut first = limit(Side::Buy, 100.0, 5.0);
        first.agent_id = 1;
        let mut second = limit(Side::Buy, 100.0, 5.0);
        second.agent_id = 2;
        book.add_order(first, 0).unwrap();
        book.add_order(second, 1).unwrap();
        book.add_order(limit(Side::Sell, 100.0, 5.0), 2).unwrap();

        let trades = book.matching(3);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buyer_agent_id, 1);
    }

    #[test]
    fn clear_removes_all_state() {
        let book = OrderBook::new("XAU");
        book.add_order(limit(Side::Buy, 100.0, 5.0), 0).unwrap();
        book.clear();
        assert_eq!(book.best_bid(), 0.0);
    }
}
