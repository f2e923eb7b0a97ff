//! Deterministic test fixtures shared across this crate and `market-agents`.
//!
//! Not `#[cfg(test)]`-gated: `market-agents`' own test suite depends on these
//! builders to stand up a minimal engine/simulation without duplicating
//! commodity/config boilerplate in every test module.

pub mod helpers;

pub use helpers::{test_commodity, test_config, test_world, NoopAgent};
