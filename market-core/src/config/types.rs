//! `RuntimeConfig`: the versioned, mergeable configuration record.
//!
//! Unlike the teacher's compile-time Cargo-feature configuration, this
//! record is a plain runtime data structure, patched via merge-patch
//! semantics while the simulation runs (spec.md §9 "Hot-reconfiguration").

use serde::{Deserialize, Serialize};

use crate::news::{CategoryWeights, NewsSigmas};
use crate::orderbook::DEFAULT_MAX_ORDER_AGE_MS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
    #[serde(default = "default_populate_ticks_per_day")]
    pub populate_ticks_per_day: u32,
    #[serde(default = "default_populate_fine_ticks_per_day")]
    pub populate_fine_ticks_per_day: u32,
    #[serde(default = "default_populate_fine_days")]
    pub populate_fine_days: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: default_tick_rate_ms(),
            populate_ticks_per_day: default_populate_ticks_per_day(),
            populate_fine_ticks_per_day: default_populate_fine_ticks_per_day(),
            populate_fine_days: default_populate_fine_days(),
        }
    }
}

fn default_tick_rate_ms() -> u64 {
    1000
}
fn default_populate_ticks_per_day() -> u32 {
    50
}
fn default_populate_fine_ticks_per_day() -> u32 {
    500
}
fn default_populate_fine_days() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_reference_ticks_per_day")]
    pub reference_ticks_per_day: u32,
    #[serde(default = "default_ticks_per_day")]
    pub ticks_per_day: u32,
    #[serde(default = "default_fundamental_shock_clamp")]
    pub fundamental_shock_clamp: f64,
    #[serde(default = "default_news_to_fundamental_scale")]
    pub news_to_fundamental_scale: f64,
    #[serde(default = "default_company_shock_sigma")]
    pub company_shock_sigma: f64,
    #[serde(default = "default_industry_shock_decay")]
    pub industry_shock_decay: f64,
    #[serde(default = "default_annual_growth_rate")]
    pub annual_growth_rate: f64,
    #[serde(default = "default_global_sentiment_mean")]
    pub global_sentiment_mean: f64,
    #[serde(default = "default_sentiment_decay")]
    pub sentiment_decay: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_ticks_per_day: default_reference_ticks_per_day(),
            ticks_per_day: default_ticks_per_day(),
            fundamental_shock_clamp: default_fundamental_shock_clamp(),
            news_to_fundamental_scale: default_news_to_fundamental_scale(),
            company_shock_sigma: default_company_shock_sigma(),
            industry_shock_decay: default_industry_shock_decay(),
            annual_growth_rate: default_annual_growth_rate(),
            global_sentiment_mean: default_global_sentiment_mean(),
            sentiment_decay: default_sentiment_decay(),
        }
    }
}

fn default_reference_ticks_per_day() -> u32 {
    100
}
fn default_ticks_per_day() -> u32 {
    100
}
fn default_fundamental_shock_clamp() -> f64 {
    0.05
}
fn default_news_to_fundamental_scale() -> f64 {
    0.01
}
fn default_company_shock_sigma() -> f64 {
    0.002
}
fn default_industry_shock_decay() -> f64 {
    0.9
}
fn default_annual_growth_rate() -> f64 {
    0.03
}
fn default_global_sentiment_mean() -> f64 {
    0.0
}
fn default_sentiment_decay() -> f64 {
    0.95
}

/// Defaults applied to every commodity created at `initialize`/
/// `reinitialize`; individual commodities may diverge afterward via trading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetConfig {
    #[serde(default = "default_price_floor")]
    pub price_floor: f64,
    #[serde(default = "default_impact_dampening")]
    pub impact_dampening: f64,
    #[serde(default = "default_shock_clamp")]
    pub shock_clamp: f64,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    #[serde(default = "default_max_daily_move")]
    pub max_daily_move: f64,
    #[serde(default = "default_supply_demand_noise_sigma")]
    pub supply_demand_noise_sigma: f64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            price_floor: default_price_floor(),
            impact_dampening: default_impact_dampening(),
            shock_clamp: default_shock_clamp(),
            decay_rate: default_decay_rate(),
            max_daily_move: default_max_daily_move(),
            supply_demand_noise_sigma: default_supply_demand_noise_sigma(),
        }
    }
}

fn default_price_floor() -> f64 {
    0.01
}
fn default_impact_dampening() -> f64 {
    0.1
}
fn default_shock_clamp() -> f64 {
    0.05
}
fn default_decay_rate() -> f64 {
    0.98
}
fn default_max_daily_move() -> f64 {
    0.1
}
fn default_supply_demand_noise_sigma() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBookConfig {
    #[serde(default = "default_max_order_age_ms")]
    pub max_order_age_ms: i64,
    #[serde(default = "default_snapshot_depth")]
    pub snapshot_depth: usize,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self { max_order_age_ms: default_max_order_age_ms(), snapshot_depth: default_snapshot_depth() }
    }
}

fn default_max_order_age_ms() -> i64 {
    DEFAULT_MAX_ORDER_AGE_MS
}
fn default_snapshot_depth() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentCounts {
    #[serde(default)]
    pub fundamental: u32,
    #[serde(default)]
    pub momentum: u32,
    #[serde(default)]
    pub mean_reversion: u32,
    #[serde(default)]
    pub noise: u32,
    #[serde(default)]
    pub market_maker: u32,
    #[serde(default)]
    pub supply_demand: u32,
    #[serde(default)]
    pub cross_effects: u32,
    #[serde(default)]
    pub inventory: u32,
    #[serde(default)]
    pub event: u32,
}

/// Shared distribution parameters the population factory samples per-agent
/// values from (spec.md §4.7 "Factory").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentParams {
    #[serde(default = "default_horizon_mu")]
    pub horizon_mu: f64,
    #[serde(default = "default_horizon_sigma")]
    pub horizon_sigma: f64,
    #[serde(default = "default_reaction_speed_rate")]
    pub reaction_speed_rate: f64,
    #[serde(default = "default_risk_aversion_mu")]
    pub risk_aversion_mu: f64,
    #[serde(default = "default_risk_aversion_sigma")]
    pub risk_aversion_sigma: f64,
    #[serde(default = "default_confidence_min")]
    pub confidence_min: f64,
    #[serde(default = "default_confidence_max")]
    pub confidence_max: f64,
    #[serde(default = "default_initial_cash_mean")]
    pub initial_cash_mean: f64,
    #[serde(default = "default_initial_cash_sigma")]
    pub initial_cash_sigma: f64,
    #[serde(default = "default_initial_cash_floor")]
    pub initial_cash_floor: f64,
    #[serde(default = "default_capital_fraction")]
    pub capital_fraction: f64,
    #[serde(default = "default_max_order_size")]
    pub max_order_size: f64,
    #[serde(default = "default_cash_reserve")]
    pub cash_reserve: f64,
    #[serde(default = "default_max_short")]
    pub max_short: f64,
    #[serde(default = "default_news_weight")]
    pub news_weight: f64,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            horizon_mu: default_horizon_mu(),
            horizon_sigma: default_horizon_sigma(),
            reaction_speed_rate: default_reaction_speed_rate(),
            risk_aversion_mu: default_risk_aversion_mu(),
            risk_aversion_sigma: default_risk_aversion_sigma(),
            confidence_min: default_confidence_min(),
            confidence_max: default_confidence_max(),
            initial_cash_mean: default_initial_cash_mean(),
            initial_cash_sigma: default_initial_cash_sigma(),
            initial_cash_floor: default_initial_cash_floor(),
            capital_fraction: default_capital_fraction(),
            max_order_size: default_max_order_size(),
            cash_reserve: default_cash_reserve(),
            max_short: default_max_short(),
            news_weight: default_news_weight(),
        }
    }
}

fn default_horizon_mu() -> f64 {
    3.0
}
fn default_horizon_sigma() -> f64 {
    0.5
}
fn default_reaction_speed_rate() -> f64 {
    1.0
}
fn default_risk_aversion_mu() -> f64 {
    1.0
}
fn default_risk_aversion_sigma() -> f64 {
    0.3
}
fn default_confidence_min() -> f64 {
    0.3
}
fn default_confidence_max() -> f64 {
    1.0
}
fn default_initial_cash_mean() -> f64 {
    100_000.0
}
fn default_initial_cash_sigma() -> f64 {
    20_000.0
}
fn default_initial_cash_floor() -> f64 {
    1_000.0
}
fn default_capital_fraction() -> f64 {
    0.1
}
fn default_max_order_size() -> f64 {
    1_000.0
}
fn default_cash_reserve() -> f64 {
    0.1
}
fn default_max_short() -> f64 {
    500.0
}
fn default_news_weight() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketMakerConfig {
    #[serde(default = "default_mm_fundamental_weight")]
    pub fundamental_weight: f64,
    #[serde(default = "default_mm_base_spread_bps")]
    pub base_spread_bps: f64,
    #[serde(default = "default_mm_inventory_skew")]
    pub inventory_skew: f64,
    #[serde(default = "default_mm_max_inventory")]
    pub max_inventory: f64,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            fundamental_weight: default_mm_fundamental_weight(),
            base_spread_bps: default_mm_base_spread_bps(),
            inventory_skew: default_mm_inventory_skew(),
            max_inventory: default_mm_max_inventory(),
        }
    }
}

fn default_mm_fundamental_weight() -> f64 {
    0.3
}
fn default_mm_base_spread_bps() -> f64 {
    10.0
}
fn default_mm_inventory_skew() -> f64 {
    0.2
}
fn default_mm_max_inventory() -> f64 {
    1_000.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsConfig {
    #[serde(default = "default_news_lambda")]
    pub lambda: f64,
    #[serde(default)]
    pub sigmas: NewsSigmas,
    #[serde(default)]
    pub weights: CategoryWeights,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self { lambda: default_news_lambda(), sigmas: NewsSigmas::default(), weights: CategoryWeights::default() }
    }
}

fn default_news_lambda() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub asset_defaults: AssetConfig,
    #[serde(default)]
    pub order_book: OrderBookConfig,
    #[serde(default)]
    pub agent_counts: AgentCounts,
    #[serde(default)]
    pub agent_params: AgentParams,
    #[serde(default)]
    pub market_maker: MarketMakerConfig,
    #[serde(default)]
    pub news: NewsConfig,
}

impl RuntimeConfig {
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
