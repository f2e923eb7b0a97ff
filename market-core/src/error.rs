//! Error taxonomy for the simulation core.
//!
//! Each boundary (config patch, order submission, lifecycle control) has its
//! own small error enum rather than one crate-wide error type, so callers can
//! match exhaustively on what can actually go wrong at that boundary.

use thiserror::Error;

/// Errors raised while validating or applying a `RuntimeConfig` patch.
///
/// A patch either applies in full or not at all: validation happens before
/// any field is written, so these never leave the config half-updated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("malformed date: {0}")]
    MalformedDate(String),

    #[error("non-scalar leaf at `{path}` where a scalar value was expected")]
    NonScalarLeaf { path: String },

    #[error("negative count at `{path}`: {value}")]
    NegativeCount { path: String, value: i64 },
}

/// Errors raised by order submission and cancellation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("non-positive quantity: {0}")]
    NonPositiveQuantity(f64),

    #[error("invalid limit price: {0}")]
    InvalidLimitPrice(f64),

    #[error("unknown order id: {0}")]
    UnknownOrderId(u64),
}

/// Errors raised by `Simulation` lifecycle control operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("simulation is already running")]
    AlreadyRunning,

    #[error("simulation is already populating")]
    AlreadyPopulating,

    #[error("unknown control action: {0}")]
    UnknownAction(String),

    #[error("invalid state transition from {from} via {action}")]
    InvalidTransition { from: &'static str, action: &'static str },
}
