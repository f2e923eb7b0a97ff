//! `Simulation`: owns the engine and the read/write lock guarding it, drives
//! the run loop, serves populate modes (spec.md §4.8, §5).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::clock::SimClock;
use crate::commodity::Commodity;
use crate::config::RuntimeConfig;
use crate::engine::MarketEngine;
use crate::error::LifecycleError;
use crate::tickbuffer::{TickBuffer, TickOhlcv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimState {
    Idle,
    Running,
    Paused,
    Populating,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateProgress {
    pub current: u64,
    pub target: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateView {
    pub running: bool,
    pub paused: bool,
    pub populating: bool,
    pub current_tick: u64,
    pub populate_progress: Option<PopulateProgress>,
    pub sim_date: String,
    pub sim_datetime: String,
    pub sim_timestamp: i64,
}

/// A fresh set of commodities/agents built from the current `RuntimeConfig`,
/// supplied by the caller (typically the `market-agents` population factory)
/// since this crate does not depend on concrete agent implementations.
pub type WorldBuilder = Box<dyn Fn(&RuntimeConfig) -> (SimClock, Vec<Commodity>, Vec<Box<dyn Agent>>) + Send + Sync>;

pub struct Simulation {
    engine: Arc<RwLock<MarketEngine>>,
    config: RwLock<RuntimeConfig>,
    tick_buffer: TickBuffer,
    state: RwLock<SimState>,
    stop_flag: Arc<AtomicBool>,
    pause_flag: Arc<AtomicBool>,
    run_handle: RwLock<Option<JoinHandle<()>>>,
    populate_progress: RwLock<Option<PopulateProgress>>,
    world_builder: WorldBuilder,
    seed: AtomicU64,
}

impl Simulation {
    pub fn new(
        config: RuntimeConfig,
        world_builder: WorldBuilder,
        tick_buffer_capacity: usize,
        seed: u64,
    ) -> Self {
        let (clock, commodities, agents) = world_builder(&config);
        let engine = MarketEngine::new(clock, commodities, agents, config.clone(), seed);

        Self {
            engine: Arc::new(RwLock::new(engine)),
            config: RwLock::new(config),
            tick_buffer: TickBuffer::new(tick_buffer_capacity),
            state: RwLock::new(SimState::Idle),
            stop_flag: Arc::new(AtomicBool::new(false)),
            pause_flag: Arc::new(AtomicBool::new(false)),
            run_handle: RwLock::new(None),
            populate_progress: RwLock::new(None),
            world_builder,
            seed: AtomicU64::new(seed),
        }
    }

    // ---- Queries (read-lock) ----------------------------------------

    pub fn get_state(&self) -> StateView {
        let state = *self.state.read();
        let engine = self.engine.read();
        let clock = engine.clock();
        StateView {
            running: state == SimState::Running,
            paused: state == SimState::Paused,
            populating: state == SimState::Populating,
            current_tick: clock.total_ticks(),
            populate_progress: self.populate_progress.read().clone(),
            sim_date: clock.sim_date(),
            sim_datetime: clock.sim_datetime(),
            sim_timestamp: clock.sim_epoch_ms(),
        }
    }

    pub fn engine(&self) -> &Arc<RwLock<MarketEngine>> {
        &self.engine
    }

    pub fn tick_buffer(&self) -> &TickBuffer {
        &self.tick_buffer
    }

    pub fn get_config(&self) -> RuntimeConfig {
        self.config.read().clone()
    }

    pub fn get_default_config(&self) -> RuntimeConfig {
        RuntimeConfig::default()
    }

    // ---- Commands (write-lock) ---------------------------------------

    pub fn control(&self, action: &str) -> Result<(), LifecycleError> {
        match action {
            "start" => self.start(),
            "pause" => self.pause(),
            "resume" => self.resume(),
            "stop" => {
                self.stop();
                Ok(())
            }
            "reset" => {
                self.reset();
                Ok(())
            }
            other => Err(LifecycleError::UnknownAction(other.to_string())),
        }
    }

    pub fn start(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.write();
        match *state {
            SimState::Running => return Err(LifecycleError::AlreadyRunning),
            SimState::Populating => return Err(LifecycleError::AlreadyPopulating),
            _ => {}
        }
        *state = SimState::Running;
        self.stop_flag.store(false, Ordering::SeqCst);
        self.pause_flag.store(false, Ordering::SeqCst);

        let engine = Arc::clone(&self.engine);
        let stop_flag = Arc::clone(&self.stop_flag);
        let pause_flag = Arc::clone(&self.pause_flag);
        let tick_rate_ms = self.config.read().simulation.tick_rate_ms;

        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(tick_rate_ms));
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                if pause_flag.load(Ordering::SeqCst) {
                    continue;
                }
                engine.write().tick();
            }
        });
        *self.run_handle.write() = Some(handle);
        info!("simulation started");
        Ok(())
    }

    pub fn pause(&self) -> Result<(), LifecycleError> {
        let state = *self.state.read();
        if state != SimState::Running {
            warn!(from = state_name(state), "pause rejected");
            return Err(LifecycleError::InvalidTransition { from: state_name(state), action: "pause" });
        }
        self.pause_flag.store(true, Ordering::SeqCst);
        *self.state.write() = SimState::Paused;
        info!("simulation paused");
        Ok(())
    }

    pub fn resume(&self) -> Result<(), LifecycleError> {
        let state = *self.state.read();
        if state != SimState::Paused {
            warn!(from = state_name(state), "resume rejected");
            return Err(LifecycleError::InvalidTransition { from: state_name(state), action: "resume" });
        }
        self.pause_flag.store(false, Ordering::SeqCst);
        *self.state.write() = SimState::Running;
        info!("simulation resumed");
        Ok(())
    }

    /// Signals the run thread to exit at the next boundary and joins it; a
    /// writer already inside a tick is allowed to finish (no preemption).
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.run_handle.write().take() {
            let _ = handle.join();
        }
        *self.state.write() = SimState::Idle;
        info!("simulation stopped");
    }

    /// Advances `n` ticks synchronously under the write lock.
    pub fn step(&self, n: u64) {
        let mut engine = self.engine.write();
        for _ in 0..n {
            engine.tick();
        }
    }

    /// Rejected unless idle. Coarse phase advances `days -
    /// populate_fine_days` at `populate_ticks_per_day`, then a fine phase
    /// advances the last `populate_fine_days` at
    /// `populate_fine_ticks_per_day`. If `days < populate_fine_days`, the
    /// coarse phase is skipped entirely (DESIGN.md Open Question 4).
    pub fn populate(&self, days: u64, start_date: &str) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.write();
            match *state {
                SimState::Running => return Err(LifecycleError::AlreadyRunning),
                SimState::Populating => return Err(LifecycleError::AlreadyPopulating),
                _ => {}
            }
            *state = SimState::Populating;
        }

        let config = self.config.read().clone();
        let fine_days = config.simulation.populate_fine_days as u64;
        let coarse_days = days.saturating_sub(fine_days);
        let coarse_ticks = coarse_days * config.simulation.populate_ticks_per_day as u64;
        let fine_days_actual = days.min(fine_days);
        let fine_ticks = fine_days_actual * config.simulation.populate_fine_ticks_per_day as u64;
        let target = coarse_ticks + fine_ticks;

        info!(days, coarse_days, fine_days = fine_days_actual, target, "populate starting");
        let _ = start_date;

        let mut coarse_config = config.clone();
        coarse_config.engine.ticks_per_day = config.simulation.populate_ticks_per_day.max(1);
        self.engine.write().apply_config(coarse_config);

        let mut done = 0u64;
        for _ in 0..coarse_ticks {
            let mut engine = self.engine.write();
            engine.tick();
            self.record_tick(&engine);
            drop(engine);
            done += 1;
            *self.populate_progress.write() = Some(PopulateProgress { current: done, target });
        }

        let mut fine_config = config.clone();
        fine_config.engine.ticks_per_day = config.simulation.populate_fine_ticks_per_day.max(1);
        self.engine.write().apply_config(fine_config);

        for _ in 0..fine_ticks {
            let mut engine = self.engine.write();
            engine.tick();
            self.record_tick(&engine);
            drop(engine);
            done += 1;
            *self.populate_progress.write() = Some(PopulateProgress { current: done, target });
        }

        let restore_config = self.config.read().clone();
        self.engine.write().apply_config(restore_config);

        *self.populate_progress.write() = None;
        *self.state.write() = SimState::Idle;
        info!(ticks = done, "populate finished");
        Ok(())
    }

    fn record_tick(&self, engine: &MarketEngine) {
        let tick = engine.clock().total_ticks();
        for (symbol, commodity) in engine.commodities() {
            let candle = engine.candles().get_current_candle(symbol, crate::candles::Interval::OneMinute);
            let ohlcv = match candle {
                Some(c) => TickOhlcv { tick, open: c.open, high: c.high, low: c.low, close: c.close, volume: c.volume },
                None => TickOhlcv {
                    tick,
                    open: commodity.price,
                    high: commodity.price,
                    low: commodity.price,
                    close: commodity.price,
                    volume: 0.0,
                },
            };
            self.tick_buffer.record(symbol, tick, ohlcv, &[]);
        }
    }

    /// Merge-patches the current config and hot-propagates tick rate, news
    /// lambda, per-commodity tunables, and order-book expiry.
    pub fn patch_config(&self, patch: &Value) -> Result<(), crate::error::ConfigError> {
        let mut config = self.config.write();
        config.patch(patch)?;
        self.engine.write().apply_config(config.clone());
        Ok(())
    }

    /// Replaces the config with defaults and reinitializes.
    pub fn reset_config(&self) {
        *self.config.write() = RuntimeConfig::default();
        self.reinitialize();
    }

    /// Rebuilds commodities and agents from the current config.
    pub fn reinitialize(&self) {
        let config = self.config.read().clone();
        let (clock, commodities, agents) = (self.world_builder)(&config);
        self.engine.write().reinitialize(clock, commodities, agents, config);
    }

    /// Stops and clears all engine state: books, candles, news, trades,
    /// sentiment, and the tick buffer, then rebuilds commodities/agents/clock
    /// from the current config so the simulation is ready to run again.
    pub fn reset(&self) {
        self.stop();
        self.engine.write().reset();
        self.reinitialize();
        self.tick_buffer.reset();
        *self.populate_progress.write() = None;
        info!("simulation reset");
    }

    pub fn seed(&self) -> u64 {
        self.seed.load(Ordering::SeqCst)
    }
}

fn state_name(state: SimState) -> &'static str {
    match state {
        SimState::Idle => "idle",
        SimState::Running => "running",
        SimState::Paused => "paused",
        SimState::Populating => "populating",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commodity::SupplyDemand;

    struct NullAgent(u64);
    impl Agent for NullAgent {
        fn type_name(&self) -> &'static str {
            "null"
        }
        fn id(&self) -> u64 {
            self.0
        }
        fn on_tick(&mut self, _snapshot: &crate::agent::MarketSnapshot) -> Vec<crate::orderbook::Order> {
            Vec::new()
        }
        fn on_fill(&mut self, _is_buyer: bool, _trade: &crate::orderbook::Trade) {}
        fn cash(&self) -> f64 {
            0.0
        }
        fn position(&self, _symbol: &str) -> f64 {
            0.0
        }
    }

    fn test_world(config: &RuntimeConfig) -> (SimClock, Vec<Commodity>, Vec<Box<dyn Agent>>) {
        let clock = SimClock::new("2024-01-01", config.engine.ticks_per_day, config.engine.reference_ticks_per_day)
            .unwrap();
        let commodity = Commodity::new(
            "XAU",
            "Gold",
            "metal",
            100.0,
            config.asset_defaults.price_floor,
            config.asset_defaults.impact_dampening,
            config.asset_defaults.shock_clamp,
            config.asset_defaults.decay_rate,
            config.asset_defaults.max_daily_move,
            config.asset_defaults.supply_demand_noise_sigma,
            SupplyDemand::new(100.0, 100.0, 0.0, 0.0, 500.0),
        );
        let agents: Vec<Box<dyn Agent>> = vec![Box::new(NullAgent(1))];
        (clock, vec![commodity], agents)
    }

    fn make_sim() -> Simulation {
        let mut config = RuntimeConfig::default();
        config.simulation.tick_rate_ms = 1;
        Simulation::new(config, Box::new(test_world), 100, 42)
    }

    #[test]
    fn starts_idle() {
        let sim = make_sim();
        let state = sim.get_state();
        assert!(!state.running && !state.paused && !state.populating);
    }

    #[test]
    fn step_advances_ticks_synchronously() {
        let sim = make_sim();
        sim.step(5);
        assert_eq!(sim.get_state().current_tick, 5);
    }

    #[test]
    fn start_then_start_again_errors() {
        let sim = make_sim();
        sim.start().unwrap();
        let err = sim.start().unwrap_err();
        assert_eq!(err, LifecycleError::AlreadyRunning);
        sim.stop();
    }

    #[test]
    fn pause_requires_running() {
        let sim = make_sim();
        let err = sim.pause().unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn populate_is_rejected_while_running() {
        let sim = make_sim();
        sim.start().unwrap();
        let err = sim.populate(1, "2024-01-01").unwrap_err();
        assert_eq!(err, LifecycleError::AlreadyRunning);
        sim.stop();
    }

    #[test]
    fn populate_with_fewer_days_than_fine_skips_coarse_phase() {
        let sim = make_sim();
        {
            let mut config = sim.config.write();
            config.simulation.populate_fine_days = 5;
            config.simulation.populate_ticks_per_day = 2;
            config.simulation.populate_fine_ticks_per_day = 3;
        }
        sim.reinitialize();
        sim.populate(2, "2024-01-01").unwrap();
        assert_eq!(sim.get_state().current_tick, 6);
    }

    #[test]
    fn patch_config_hot_reloads_without_reinitializing_agents() {
        let sim = make_sim();
        sim.patch_config(&serde_json::json!({"news": {"lambda": 0.75}})).unwrap();
        assert_eq!(sim.get_config().news.lambda, 0.75);
    }
}
