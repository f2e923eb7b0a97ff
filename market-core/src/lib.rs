//! market-core: the commodity market simulation engine.
//!
//! A tick-driven, deterministic multi-agent market simulation: a price-time
//! priority matching engine per commodity, OHLCV candle aggregation, a
//! Poisson-process news generator, and a hot-reconfigurable runtime config,
//! orchestrated by `MarketEngine::tick` and driven by `Simulation`.
//!
//! ## Modules
//! - `clock`: deterministic simulated-time source
//! - `orderbook`: price-time-priority limit order book and matching
//! - `commodity`: per-instrument price, supply/demand, circuit breaker
//! - `candles`: OHLCV candle aggregation across fixed intervals
//! - `news`: Poisson-process news generation
//! - `agent`: the polymorphic agent trait and per-tick market snapshot
//! - `engine`: orchestrates one simulated tick end-to-end
//! - `tickbuffer`: bounded tick history log, independently lockable
//! - `simulation`: lifecycle (start/pause/populate/reset) around the engine
//! - `config`: the hot-reconfigurable `RuntimeConfig`
//! - `monitoring`: Prometheus metrics
//! - `utils`: logging setup
//! - `error`: error taxonomy

pub mod agent;
pub mod candles;
pub mod clock;
pub mod commodity;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitoring;
pub mod news;
pub mod orderbook;
pub mod simulation;
pub mod testing;
pub mod tickbuffer;
pub mod utils;

pub use agent::{Agent, MarketSnapshot};
pub use clock::SimClock;
pub use commodity::Commodity;
pub use config::RuntimeConfig;
pub use engine::MarketEngine;
pub use error::{ConfigError, LifecycleError, OrderError};
pub use orderbook::{Order, OrderBook, OrderType, Side, Trade};
pub use simulation::{SimState, Simulation};

pub use anyhow::{Error, Result};

/// Convenient glob import for consumers of this crate.
pub mod prelude {
    pub use crate::agent::{Agent, MarketSnapshot};
    pub use crate::candles::{Candle, CandleAggregator, Interval};
    pub use crate::clock::SimClock;
    pub use crate::commodity::{Commodity, SupplyDemand};
    pub use crate::config::RuntimeConfig;
    pub use crate::engine::MarketEngine;
    pub use crate::error::{ConfigError, LifecycleError, OrderError};
    pub use crate::news::{NewsCategory, NewsEvent, NewsGenerator, Sentiment};
    pub use crate::orderbook::{Order, OrderBook, OrderType, Side, Trade};
    pub use crate::simulation::{SimState, Simulation};
    pub use crate::{Error, Result};
}
