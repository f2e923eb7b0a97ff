//! Prometheus metrics for the simulation core.
//!
//! Shaped after the teacher's `MetricsRegistry` (an `Arc`-wrapped registry
//! exposing grouped sub-metric structs), re-pointed at this domain's
//! `get_metrics()` surface (spec.md §6).

use std::sync::Arc;

use prometheus::{Counter, CounterVec, Gauge, Opts, Registry};
use tracing::info;

/// Central registry for all simulation metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Arc<Registry>,
    pub total_ticks: Counter,
    pub total_trades: Counter,
    pub total_orders: Counter,
    pub avg_spread: Gauge,
    pub orders_by_agent_type: CounterVec,
    pub fills_by_agent_type: CounterVec,
    pub volume_by_agent_type: CounterVec,
    pub circuit_breaker_trips: Counter,
    pub fundamental_shock_clamps: Counter,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let total_ticks = Counter::with_opts(Opts::new("market_total_ticks", "Total ticks advanced").namespace("market"))?;
        registry.register(Box::new(total_ticks.clone()))?;

        let total_trades =
            Counter::with_opts(Opts::new("market_total_trades", "Total trades matched").namespace("market"))?;
        registry.register(Box::new(total_trades.clone()))?;

        let total_orders =
            Counter::with_opts(Opts::new("market_total_orders", "Total orders submitted").namespace("market"))?;
        registry.register(Box::new(total_orders.clone()))?;

        let avg_spread =
            Gauge::with_opts(Opts::new("market_avg_spread", "Average spread across symbols").namespace("market"))?;
        registry.register(Box::new(avg_spread.clone()))?;

        let orders_by_agent_type = CounterVec::new(
            Opts::new("market_orders_by_agent_type", "Orders submitted per agent type").namespace("market"),
            &["agent_type"],
        )?;
        registry.register(Box::new(orders_by_agent_type.clone()))?;

        let fills_by_agent_type = CounterVec::new(
            Opts::new("market_fills_by_agent_type", "Fills received per agent type").namespace("market"),
            &["agent_type"],
        )?;
        registry.register(Box::new(fills_by_agent_type.clone()))?;

        let volume_by_agent_type = CounterVec::new(
            Opts::new("market_volume_by_agent_type", "Traded volume per agent type").namespace("market"),
            &["agent_type"],
        )?;
        registry.register(Box::new(volume_by_agent_type.clone()))?;

        let circuit_breaker_trips = Counter::with_opts(
            Opts::new("market_circuit_breaker_trips", "Circuit breaker trips").namespace("market"),
        )?;
        registry.register(Box::new(circuit_breaker_trips.clone()))?;

        let fundamental_shock_clamps = Counter::with_opts(
            Opts::new("market_fundamental_shock_clamps", "Fundamental shock clamp engagements").namespace("market"),
        )?;
        registry.register(Box::new(fundamental_shock_clamps.clone()))?;

        info!("engine metrics registry initialized");

        Ok(Self {
            registry,
            total_ticks,
            total_trades,
            total_orders,
            avg_spread,
            orders_by_agent_type,
            fills_by_agent_type,
            volume_by_agent_type,
            circuit_breaker_trips,
            fundamental_shock_clamps,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new().expect("metrics registry must construct with static metric names")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_gathers_registered_families() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.total_ticks.inc();
        metrics.orders_by_agent_type.with_label_values(&["momentum"]).inc();
        assert!(!metrics.registry().gather().is_empty());
    }
}
