//! Concrete `Agent` implementations and the population factory that builds
//! a roster of them from `RuntimeConfig`.
//!
//! `market-core` defines the `Agent` trait and the engine that drives it;
//! this crate supplies the nine heterogeneous trading behaviors spec.md
//! §4.7 describes, plus the shared order-sizing helper they all use and the
//! factory that assembles a population in a stable, seed-reproducible order.
//! Building the commodity catalog itself is left to the caller: this crate
//! only produces `Vec<Box<dyn Agent>>` given a list of symbols to trade.

pub mod cross_effects;
pub mod event;
pub mod factory;
pub mod fundamental;
pub mod inventory;
pub mod market_maker;
pub mod mean_reversion;
pub mod momentum;
pub mod noise;
pub mod sizing;
pub mod supply_demand;

pub use cross_effects::CrossEffectsAgent;
pub use event::EventAgent;
pub use factory::build_population;
pub use fundamental::FundamentalAgent;
pub use inventory::InventoryAgent;
pub use market_maker::MarketMakerAgent;
pub use mean_reversion::MeanReversionAgent;
pub use momentum::MomentumAgent;
pub use noise::NoiseAgent;
pub use sizing::size_order;
pub use supply_demand::SupplyDemandAgent;
