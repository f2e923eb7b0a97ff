//! Per-(symbol, interval) OHLCV candle aggregation.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// Completed candles retained per (symbol, interval), oldest evicted first.
pub const MAX_COMPLETED_CANDLES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
}

impl Interval {
    /// Accepts both `"1m"`/`"M1"` style spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "1M" | "M1" => Some(Interval::OneMinute),
            "5M" | "M5" => Some(Interval::FiveMinutes),
            "15M" | "M15" => Some(Interval::FifteenMinutes),
            "30M" | "M30" => Some(Interval::ThirtyMinutes),
            "1H" | "H1" => Some(Interval::OneHour),
            "1D" | "D1" => Some(Interval::OneDay),
            _ => None,
        }
    }

    pub fn millis(&self) -> i64 {
        match self {
            Interval::OneMinute => 60_000,
            Interval::FiveMinutes => 5 * 60_000,
            Interval::FifteenMinutes => 15 * 60_000,
            Interval::ThirtyMinutes => 30 * 60_000,
            Interval::OneHour => 60 * 60_000,
            Interval::OneDay => 24 * 60 * 60_000,
        }
    }

    fn bucket(&self, sim_time: i64) -> i64 {
        let ms = self.millis();
        (sim_time as f64 / ms as f64).floor() as i64 * ms
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Default)]
struct CandleState {
    current: Option<Candle>,
    completed: VecDeque<Candle>,
}

/// Maintains per-(symbol, interval) partial and completed candles.
#[derive(Default)]
pub struct CandleAggregator {
    states: HashMap<(String, Interval), CandleState>,
    registered_symbols: Vec<String>,
}

impl CandleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_symbol(&mut self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        if !self.registered_symbols.contains(&symbol) {
            self.registered_symbols.push(symbol);
        }
    }

    /// Ticks for unregistered symbols are silently ignored.
    pub fn on_tick(&mut self, symbol: &str, price: f64, volume: f64, sim_time: i64) {
        if !self.registered_symbols.iter().any(|s| s == symbol) {
            return;
        }
        for interval in ALL_INTERVALS {
            self.on_tick_interval(symbol, *interval, price, volume, sim_time);
        }
    }

    fn on_tick_interval(&mut self, symbol: &str, interval: Interval, price: f64, volume: f64, sim_time: i64) {
        let bucket = interval.bucket(sim_time);
        let state = self
            .states
            .entry((symbol.to_string(), interval))
            .or_insert_with(CandleState::default);

        match state.current {
            None => {
                state.current =
                    Some(Candle { time: bucket, open: price, high: price, low: price, close: price, volume });
            }
            Some(current) if bucket > current.time => {
                if state.completed.len() >= MAX_COMPLETED_CANDLES {
                    state.completed.pop_front();
                }
                state.completed.push_back(current);
                state.current =
                    Some(Candle { time: bucket, open: price, high: price, low: price, close: price, volume });
            }
            Some(ref mut current) => {
                current.high = current.high.max(price);
                current.low = current.low.min(price);
                current.close = price;
                current.volume += volume;
            }
        }
    }

    /// Completed candles with `time >= since`, chronologically ordered,
    /// truncated to the most recent `limit`. The current (open) candle is
    /// never included.
    pub fn get_candles(&self, symbol: &str, interval: Interval, since: i64, limit: usize) -> Vec<Candle> {
        let Some(state) = self.states.get(&(symbol.to_string(), interval)) else {
            return Vec::new();
        };
        let matching: Vec<Candle> = state.completed.iter().filter(|c| c.time >= since).copied().collect();
        let start = matching.len().saturating_sub(limit);
        matching[start..].to_vec()
    }

    pub fn get_all_candles(&self, interval: Interval, since: i64) -> HashMap<String, Vec<Candle>> {
        self.registered_symbols
            .iter()
            .map(|s| (s.clone(), self.get_candles(s, interval, since, usize::MAX)))
            .collect()
    }

    pub fn get_current_candle(&self, symbol: &str, interval: Interval) -> Option<Candle> {
        self.states.get(&(symbol.to_string(), interval)).and_then(|s| s.current)
    }

    pub fn reset(&mut self) {
        self.states.clear();
    }
}

const ALL_INTERVALS: &[Interval] = &[
    Interval::OneMinute,
    Interval::FiveMinutes,
    Interval::FifteenMinutes,
    Interval::ThirtyMinutes,
    Interval::OneHour,
    Interval::OneDay,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parsing_accepts_both_forms() {
        assert_eq!(Interval::parse("1m"), Some(Interval::OneMinute));
        assert_eq!(Interval::parse("M1"), Some(Interval::OneMinute));
        assert_eq!(Interval::parse("1d"), Some(Interval::OneDay));
        assert_eq!(Interval::parse("bogus"), None);
    }

    #[test]
    fn scenario_candle_close_on_boundary() {
        let mut agg = CandleAggregator::new();
        agg.register_symbol("S");

        agg.on_tick_interval("S", Interval::OneMinute, 75.0, 1.0, 0);
        agg.on_tick_interval("S", Interval::OneMinute, 76.0, 1.0, 30_000);
        agg.on_tick_interval("S", Interval::OneMinute, 77.0, 1.0, 90_000);

        let completed = agg.get_candles("S", Interval::OneMinute, 0, 10);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].time, 0);
        assert_eq!(completed[0].open, 75.0);
        assert_eq!(completed[0].high, 76.0);
        assert_eq!(completed[0].low, 75.0);
        assert_eq!(completed[0].close, 76.0);
        assert_eq!(completed[0].volume, 2.0);

        let current = agg.get_current_candle("S", Interval::OneMinute).unwrap();
        assert_eq!(current.time, 60_000);
        assert_eq!(current.close, 77.0);
    }

    #[test]
    fn candle_invariants_hold_after_random_updates() {
        let mut agg = CandleAggregator::new();
        agg.register_symbol("S");
        let prices = [100.0, 95.0, 110.0, 90.0, 105.0, 80.0];
        for (i, p) in prices.iter().enumerate() {
            agg.on_tick_interval("S", Interval::OneMinute, *p, 1.0, i as i64 * 70_000);
        }
        for c in agg.get_candles("S", Interval::OneMinute, 0, usize::MAX) {
            assert!(c.low <= c.open.min(c.close));
            assert!(c.open.max(c.close) <= c.high);
        }
    }

    #[test]
    fn ticks_for_unregistered_symbols_are_ignored() {
        let mut agg = CandleAggregator::new();
        agg.on_tick("NOPE", 100.0, 1.0, 0);
        assert!(agg.get_current_candle("NOPE", Interval::OneMinute).is_none());
    }

    #[test]
    fn completed_candles_are_bounded() {
        let mut agg = CandleAggregator::new();
        agg.register_symbol("S");
        for i in 0..(MAX_COMPLETED_CANDLES + 10) {
            agg.on_tick_interval("S", Interval::OneMinute, 100.0, 1.0, i as i64 * 60_000);
        }
        let all = agg.get_candles("S", Interval::OneMinute, 0, usize::MAX);
        assert_eq!(all.len(), MAX_COMPLETED_CANDLES);
    }

    #[test]
    fn reset_clears_everything() {
        let mut agg = CandleAggregator::new();
        agg.register_symbol("S");
        agg.on_tick("S", 100.0, 1.0, 0);
        agg.reset();
        assert!(agg.get_current_candle("S", Interval::OneMinute).is_none());
    }
}
