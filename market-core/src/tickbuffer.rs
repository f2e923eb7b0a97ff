//! Bounded per-symbol append-only tick log, independently lockable from the
//! engine so exports can proceed while ticking advances (spec.md §5).

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::news::NewsEvent;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TickOhlcv {
    pub tick: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

struct SymbolLog {
    ticks: Vec<TickOhlcv>,
}

struct BufferState {
    symbols: HashMap<String, SymbolLog>,
    news: HashMap<u64, Vec<NewsEvent>>,
    capacity: usize,
    total_ticks: u64,
}

/// Append-only, per-symbol OHLCV log plus a per-tick news log, both bounded
/// by `capacity` with oldest-first eviction.
pub struct TickBuffer {
    state: Mutex<BufferState>,
}

impl TickBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { state: Mutex::new(BufferState { symbols: HashMap::new(), news: HashMap::new(), capacity, total_ticks: 0 }) }
    }

    pub fn record(&self, symbol: &str, tick: u64, ohlcv: TickOhlcv, news: &[NewsEvent]) {
        let mut state = self.state.lock();
        let capacity = state.capacity;

        let log = state.symbols.entry(symbol.to_string()).or_insert_with(|| SymbolLog { ticks: Vec::new() });
        if log.ticks.len() >= capacity {
            log.ticks.remove(0);
        }
        log.ticks.push(ohlcv);

        if !news.is_empty() {
            state.news.insert(tick, news.to_vec());
            if state.news.len() > capacity {
                if let Some(&oldest) = state.news.keys().min() {
                    state.news.remove(&oldest);
                }
            }
        }

        state.total_ticks = state.total_ticks.max(tick);
    }

    pub fn total_ticks(&self) -> u64 {
        self.state.lock().total_ticks
    }

    pub fn exported_ticks(&self, symbol: &str) -> usize {
        self.state.lock().symbols.get(symbol).map(|l| l.ticks.len()).unwrap_or(0)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.state.lock().symbols.keys().cloned().collect()
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.symbols.clear();
        state.news.clear();
        state.total_ticks = 0;
    }

    /// Dumps the buffer to a single JSON file, per spec.md §6's format:
    /// `{ "<symbol>": { ticks: [...], orderbooks: {} }, ..., "_news": {...} }`.
    pub fn dump_json(&self, path: &Path) -> std::io::Result<()> {
        let state = self.state.lock();
        let mut root = serde_json::Map::new();
        for (symbol, log) in &state.symbols {
            let mut entry = serde_json::Map::new();
            entry.insert("ticks".into(), serde_json::to_value(&log.ticks).unwrap());
            entry.insert("orderbooks".into(), serde_json::Value::Object(Default::default()));
            root.insert(symbol.clone(), serde_json::Value::Object(entry));
        }
        let news_obj: serde_json::Map<String, serde_json::Value> = state
            .news
            .iter()
            .map(|(tick, events)| (tick.to_string(), serde_json::to_value(events).unwrap()))
            .collect();
        root.insert("_news".into(), serde_json::Value::Object(news_obj));

        let json = serde_json::to_string_pretty(&serde_json::Value::Object(root))?;
        fs::write(path, json)
    }

    /// Dumps one CSV file per symbol (columns `tick,open,high,low,close,volume`,
    /// OHLC at `%.4f`, volume at `%.2f`) plus a `metadata.json` with
    /// `{totalTicks, exportedTicks, commodities, exportedAt}` (spec.md §6).
    /// `exported_at` is supplied by the caller (an RFC 3339 timestamp)
    /// rather than read from the system clock here, so the dump itself
    /// stays a deterministic function of buffer state.
    pub fn dump_csv(&self, dir: &Path, exported_at: &str) -> std::io::Result<()> {
        let state = self.state.lock();
        fs::create_dir_all(dir)?;

        for (symbol, log) in &state.symbols {
            let path = dir.join(format!("{symbol}.csv"));
            let mut file = fs::File::create(path)?;
            writeln!(file, "tick,open,high,low,close,volume")?;
            for t in &log.ticks {
                writeln!(
                    file,
                    "{},{:.4},{:.4},{:.4},{:.4},{:.2}",
                    t.tick, t.open, t.high, t.low, t.close, t.volume
                )?;
            }
        }

        let exported_ticks: usize = state.symbols.values().map(|l| l.ticks.len()).sum();
        let metadata = serde_json::json!({
            "totalTicks": state.total_ticks,
            "exportedTicks": exported_ticks,
            "commodities": state.symbols.keys().collect::<Vec<_>>(),
            "exportedAt": exported_at,
        });
        fs::write(dir.join("metadata.json"), serde_json::to_string_pretty(&metadata)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ohlcv(tick: u64, close: f64) -> TickOhlcv {
        TickOhlcv { tick, open: close, high: close, low: close, close, volume: 1.0 }
    }

    #[test]
    fn records_are_bounded() {
        let buf = TickBuffer::new(3);
        for i in 0..10 {
            buf.record("XAU", i, ohlcv(i, 100.0), &[]);
        }
        assert_eq!(buf.exported_ticks("XAU"), 3);
    }

    #[test]
    fn dump_json_contains_symbol_and_news_keys() {
        let buf = TickBuffer::new(10);
        buf.record("XAU", 0, ohlcv(0, 100.0), &[]);
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.json");
        buf.dump_json(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("XAU"));
        assert!(contents.contains("_news"));
    }

    #[test]
    fn dump_csv_writes_metadata() {
        let buf = TickBuffer::new(10);
        buf.record("XAU", 0, ohlcv(0, 100.0), &[]);
        let dir = tempdir().unwrap();
        buf.dump_csv(dir.path(), "2024-01-01T00:00:00Z").unwrap();
        assert!(dir.path().join("XAU.csv").exists());
        let metadata = fs::read_to_string(dir.path().join("metadata.json")).unwrap();
        assert!(metadata.contains("exportedAt"));
        assert!(metadata.contains("2024-01-01T00:00:00Z"));
    }
}
