//! `MarketEngine`: orchestrates one simulated tick end-to-end (spec.md §4.6).

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use crate::agent::{Agent, MarketSnapshot};
use crate::candles::CandleAggregator;
use crate::clock::SimClock;
use crate::commodity::Commodity;
use crate::config::RuntimeConfig;
use crate::monitoring::EngineMetrics;
use crate::news::{NewsCategory, NewsGenerator};
use crate::orderbook::{Order, OrderBook, Trade};

/// Bounded recent-trades log retained by the engine.
pub const MAX_RECENT_TRADES: usize = 10_000;

pub type TradeCallback = Box<dyn FnMut(&Trade) + Send>;

/// Owns commodities, order books, agents, the candle aggregator, the news
/// generator, and the sim clock. Orchestrates the total per-tick order of
/// effects specified by spec.md §4.6; `tick()` itself never fails.
pub struct MarketEngine {
    clock: SimClock,
    commodities: HashMap<String, Commodity>,
    books: HashMap<String, OrderBook>,
    agents: Vec<Box<dyn Agent>>,
    candles: CandleAggregator,
    news: NewsGenerator,
    rng: StdRng,
    metrics: EngineMetrics,
    recent_trades: VecDeque<Trade>,
    global_sentiment: f64,
    industry_sentiment: HashMap<String, f64>,
    symbol_sentiment: HashMap<String, f64>,
    config: RuntimeConfig,
    trade_callback: Option<TradeCallback>,
}

impl MarketEngine {
    pub fn new(
        clock: SimClock,
        commodities: Vec<Commodity>,
        agents: Vec<Box<dyn Agent>>,
        config: RuntimeConfig,
        seed: u64,
    ) -> Self {
        let mut books = HashMap::new();
        let mut candles = CandleAggregator::new();
        let symbols: Vec<String> = commodities.iter().map(|c| c.symbol.clone()).collect();
        for symbol in &symbols {
            let mut book = OrderBook::new(symbol.clone());
            book.set_max_order_age_ms(config.order_book.max_order_age_ms);
            books.insert(symbol.clone(), book);
            candles.register_symbol(symbol.clone());
        }

        let news = NewsGenerator::new(config.news.lambda, symbols.clone());

        Self {
            clock,
            commodities: commodities.into_iter().map(|c| (c.symbol.clone(), c)).collect(),
            books,
            agents,
            candles,
            news,
            rng: StdRng::seed_from_u64(seed),
            metrics: EngineMetrics::default(),
            recent_trades: VecDeque::new(),
            global_sentiment: 0.0,
            industry_sentiment: HashMap::new(),
            symbol_sentiment: HashMap::new(),
            config,
            trade_callback: None,
        }
    }

    pub fn set_trade_callback(&mut self, callback: TradeCallback) {
        self.trade_callback = Some(callback);
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn commodities(&self) -> &HashMap<String, Commodity> {
        &self.commodities
    }

    pub fn book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    pub fn candles(&self) -> &CandleAggregator {
        &self.candles
    }

    pub fn recent_trades(&self, symbol: Option<&str>, limit: usize) -> Vec<Trade> {
        let filtered: Vec<&Trade> = self
            .recent_trades
            .iter()
            .filter(|t| symbol.map(|s| t.symbol == s).unwrap_or(true))
            .collect();
        let start = filtered.len().saturating_sub(limit);
        filtered[start..].iter().map(|t| (*t).clone()).collect()
    }

    pub fn news_history(&self, limit: usize) -> Vec<crate::news::NewsEvent> {
        self.news.history(limit)
    }

    /// Hot-pushes tick-rate-independent tunables from `config` into every
    /// subsystem, by iteration rather than observer registration (spec.md
    /// §9). Cold values (agent counts, starting cash, initial prices) are
    /// not touched here; those require `reinitialize`.
    pub fn apply_config(&mut self, config: RuntimeConfig) {
        self.clock.set_ticks_per_day(config.engine.ticks_per_day);
        self.news.set_lambda(config.news.lambda);
        self.news.set_sigmas(config.news.sigmas.clone());
        self.news.set_weights(config.news.weights.clone());
        for book in self.books.values_mut() {
            book.set_max_order_age_ms(config.order_book.max_order_age_ms);
        }
        for commodity in self.commodities.values_mut() {
            commodity.price_floor = config.asset_defaults.price_floor;
            commodity.impact_dampening = config.asset_defaults.impact_dampening;
            commodity.shock_clamp = config.asset_defaults.shock_clamp;
            commodity.decay_rate = config.asset_defaults.decay_rate;
            commodity.circuit_breaker.max_daily_move = config.asset_defaults.max_daily_move;
            commodity.supply_demand_noise_sigma = config.asset_defaults.supply_demand_noise_sigma;
        }
        self.config = config;
    }

    /// Place an order on behalf of `agent_id` (0 for external/user orders
    /// per spec.md §6), immediately matching the affected book.
    pub fn place_order(&mut self, order: Order) -> Result<(u64, Vec<Trade>), crate::error::OrderError> {
        let now = self.clock.sim_epoch_ms();
        let book = self
            .books
            .get(&order.symbol)
            .ok_or_else(|| crate::error::OrderError::UnknownSymbol(order.symbol.clone()))?;
        let id = book.add_order(order.clone(), now)?;
        let trades = book.matching(now);
        self.settle_trades(&order.symbol, &trades);
        Ok((id, trades))
    }

    pub fn cancel_order(&self, symbol: &str, id: u64) -> bool {
        self.books.get(symbol).map(|b| b.cancel_order(id)).unwrap_or(false)
    }

    /// Advances the simulation by exactly one tick, per the total order of
    /// effects in spec.md §4.6. Agent panics are caught and logged; the
    /// offending agent's orders for the tick are discarded. This function
    /// never returns an error.
    pub fn tick(&mut self) {
        // 1. Advance clock; day-boundary resets.
        self.clock.tick();
        if self.clock.is_new_day() {
            for commodity in self.commodities.values_mut() {
                commodity.reset_circuit_breaker();
                commodity.mark_day_open();
                commodity.daily_volume = 0.0;
            }
        }
        let sim_time = self.clock.sim_epoch_ms();
        let tick_scale = self.clock.tick_scale();

        // 2. Step news, apply macro/per-commodity sentiment and supply/demand shocks.
        let news_events = self.news.tick(tick_scale, sim_time, &mut self.rng);
        self.apply_news_effects(&news_events, tick_scale);

        // 3. Update fundamentals.
        self.update_fundamentals(&news_events, tick_scale);

        // 4. Update supply/demand, in a stable order so RNG draws are
        // deterministic across runs regardless of HashMap iteration order.
        let mut symbols: Vec<String> = self.commodities.keys().cloned().collect();
        symbols.sort();
        for symbol in &symbols {
            let commodity = self.commodities.get_mut(symbol).expect("symbol drawn from commodities keys");
            commodity.update_supply_demand(tick_scale, &mut self.rng);
        }

        // 5. Build snapshot, poll agents in fixed order.
        let snapshot = self.build_snapshot(sim_time, tick_scale, news_events);
        let mut orders_by_symbol: HashMap<String, Vec<Order>> = HashMap::new();
        for agent in self.agents.iter_mut() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| agent.on_tick(&snapshot)));
            match result {
                Ok(orders) => {
                    for order in orders {
                        self.metrics.total_orders.inc();
                        self.metrics.orders_by_agent_type.with_label_values(&[agent.type_name()]).inc();
                        orders_by_symbol.entry(order.symbol.clone()).or_default().push(order);
                    }
                }
                Err(_) => {
                    warn!(agent_type = agent.type_name(), agent_id = agent.id(), "agent panicked during on_tick; orders dropped");
                }
            }
        }

        // 6/7. Ingest, match, settle, keep candles smooth for quiet symbols.
        let symbols: Vec<String> = self.commodities.keys().cloned().collect();
        for symbol in symbols {
            if let Some(orders) = orders_by_symbol.remove(&symbol) {
                let book = self.books.get(&symbol).expect("book exists for every commodity");
                for order in orders {
                    if let Err(e) = book.add_order(order, sim_time) {
                        warn!(symbol = %symbol, error = %e, "agent produced invalid order; dropped");
                    }
                }
            }
            let trades = self.books.get(&symbol).expect("book exists for every commodity").matching(sim_time);
            let traded = !trades.is_empty();
            self.settle_trades(&symbol, &trades);
            if !traded {
                let price = self.commodities.get(&symbol).map(|c| c.price).unwrap_or(0.0);
                self.candles.on_tick(&symbol, price, 0.0, sim_time);
            }
        }

        self.metrics.total_ticks.inc();
        let spreads: Vec<f64> = self.books.values().map(|b| b.spread()).filter(|s| *s > 0.0).collect();
        if !spreads.is_empty() {
            self.metrics.avg_spread.set(spreads.iter().sum::<f64>() / spreads.len() as f64);
        }
    }

    fn settle_trades(&mut self, symbol: &str, trades: &[Trade]) {
        for trade in trades {
            self.metrics.total_trades.inc();
            self.metrics.fills_by_agent_type.with_label_values(&[&trade.buyer_agent_type]).inc();
            self.metrics.fills_by_agent_type.with_label_values(&[&trade.seller_agent_type]).inc();
            self.metrics
                .volume_by_agent_type
                .with_label_values(&[&trade.buyer_agent_type])
                .inc_by(trade.price * trade.quantity);
            self.metrics
                .volume_by_agent_type
                .with_label_values(&[&trade.seller_agent_type])
                .inc_by(trade.price * trade.quantity);

            for agent in self.agents.iter_mut() {
                if agent.id() == trade.buyer_agent_id {
                    agent.on_fill(true, trade);
                }
                if agent.id() == trade.seller_agent_id {
                    agent.on_fill(false, trade);
                }
            }

            if let Some(commodity) = self.commodities.get_mut(symbol) {
                commodity.apply_trade_price(trade.price, trade.quantity);
                commodity.daily_volume += trade.quantity;
            }
            self.candles.on_tick(symbol, trade.price, trade.quantity, trade.timestamp);

            if self.recent_trades.len() >= MAX_RECENT_TRADES {
                self.recent_trades.pop_front();
            }
            self.recent_trades.push_back(trade.clone());

            if let Some(cb) = self.trade_callback.as_mut() {
                cb(trade);
            }
        }
    }

    fn apply_news_effects(&mut self, events: &[crate::news::NewsEvent], tick_scale: f64) {
        let mean = self.config.engine.global_sentiment_mean;
        let decay = self.config.engine.sentiment_decay.powf(tick_scale);
        let normal = Normal::new(0.0, 0.01 * tick_scale.sqrt()).unwrap();
        self.global_sentiment = mean + (self.global_sentiment - mean) * decay + normal.sample(&mut self.rng);

        for (_, v) in self.industry_sentiment.iter_mut() {
            *v *= decay;
        }
        for (_, v) in self.symbol_sentiment.iter_mut() {
            *v *= decay;
        }

        for event in events {
            let signed = match event.sentiment {
                crate::news::Sentiment::Positive => event.magnitude,
                crate::news::Sentiment::Negative => -event.magnitude,
                crate::news::Sentiment::Neutral => 0.0,
            };

            match event.category {
                NewsCategory::Global | NewsCategory::Political => {
                    self.global_sentiment += signed * 0.1;
                }
                NewsCategory::Industry => {
                    if let Some(target) = &event.target {
                        *self.industry_sentiment.entry(target.clone()).or_insert(0.0) += signed;
                    }
                }
                NewsCategory::Company => {
                    if let Some(target) = &event.target {
                        *self.symbol_sentiment.entry(target.clone()).or_insert(0.0) += signed;
                    }
                }
                NewsCategory::Supply => {
                    if let Some(target) = &event.target {
                        if let Some(c) = self.commodities.get_mut(target) {
                            c.apply_supply_shock(signed);
                        }
                    }
                }
                NewsCategory::Demand => {
                    if let Some(target) = &event.target {
                        if let Some(c) = self.commodities.get_mut(target) {
                            c.apply_demand_shock(signed);
                        }
                    }
                }
            }
        }
    }

    fn update_fundamentals(&mut self, events: &[crate::news::NewsEvent], tick_scale: f64) {
        let growth_rate = self.config.engine.annual_growth_rate / self.clock.ticks_per_day() as f64 * tick_scale;
        let company_sigma = self.config.engine.company_shock_sigma;
        let news_scale = self.config.engine.news_to_fundamental_scale;
        let industry_decay = self.config.engine.industry_shock_decay;

        let news_by_symbol: HashMap<&str, f64> = {
            let mut map: HashMap<&str, f64> = HashMap::new();
            for event in events {
                if let Some(target) = &event.target {
                    let signed = match event.sentiment {
                        crate::news::Sentiment::Positive => event.magnitude,
                        crate::news::Sentiment::Negative => -event.magnitude,
                        crate::news::Sentiment::Neutral => 0.0,
                    };
                    *map.entry(target.as_str()).or_insert(0.0) += signed;
                }
            }
            map
        };

        let industry_sentiment = self.industry_sentiment.clone();
        let symbol_sentiment = self.symbol_sentiment.clone();

        let mut symbols: Vec<String> = self.commodities.keys().cloned().collect();
        symbols.sort();
        for symbol in &symbols {
            let commodity = self.commodities.get_mut(symbol).expect("symbol drawn from commodities keys");
            let normal = Normal::new(0.0, company_sigma).unwrap();
            let company_shock = normal.sample(&mut self.rng) * commodity.fundamental;
            let industry_shock = industry_sentiment.get(&commodity.category).copied().unwrap_or(0.0)
                * industry_decay
                * commodity.fundamental
                * 0.01;
            let symbol_news = news_by_symbol.get(commodity.symbol.as_str()).copied().unwrap_or(0.0)
                + symbol_sentiment.get(&commodity.symbol).copied().unwrap_or(0.0);
            let news_shift = symbol_news * news_scale * commodity.fundamental;
            let growth = growth_rate * commodity.fundamental;

            let mut delta = growth + company_shock + industry_shock + news_shift;
            let clamp = self.config.engine.fundamental_shock_clamp * commodity.fundamental;
            if delta.abs() > clamp {
                delta = delta.signum() * clamp;
                self.metrics.fundamental_shock_clamps.inc();
            }
            commodity.fundamental = (commodity.fundamental + delta).max(commodity.price_floor);
        }
    }

    fn build_snapshot(
        &self,
        sim_time: i64,
        tick_scale: f64,
        recent_news: Vec<crate::news::NewsEvent>,
    ) -> MarketSnapshot {
        let mut prices = HashMap::new();
        let mut fundamentals = HashMap::new();
        let mut supply_demand = HashMap::new();
        let mut best_bids = HashMap::new();
        let mut best_asks = HashMap::new();

        for (symbol, commodity) in &self.commodities {
            prices.insert(symbol.clone(), commodity.price);
            fundamentals.insert(symbol.clone(), commodity.fundamental);
            supply_demand.insert(symbol.clone(), commodity.supply_demand.clone());
        }
        for (symbol, book) in &self.books {
            best_bids.insert(symbol.clone(), book.best_bid());
            best_asks.insert(symbol.clone(), book.best_ask());
        }

        MarketSnapshot {
            sim_time,
            tick_scale,
            prices,
            fundamentals,
            supply_demand,
            best_bids,
            best_asks,
            recent_news,
            global_sentiment: self.global_sentiment,
            industry_sentiment: self.industry_sentiment.clone(),
            symbol_sentiment: self.symbol_sentiment.clone(),
        }
    }

    /// Rebuilds commodities and agents from `config`, preserving nothing
    /// else (spec.md §4.6 `reinitialize`).
    pub fn reinitialize(&mut self, clock: SimClock, commodities: Vec<Commodity>, agents: Vec<Box<dyn Agent>>, config: RuntimeConfig) {
        let symbols: Vec<String> = commodities.iter().map(|c| c.symbol.clone()).collect();
        self.books.clear();
        self.candles.reset();
        for symbol in &symbols {
            let mut book = OrderBook::new(symbol.clone());
            book.set_max_order_age_ms(config.order_book.max_order_age_ms);
            self.books.insert(symbol.clone(), book);
            self.candles.register_symbol(symbol.clone());
        }
        self.commodities = commodities.into_iter().map(|c| (c.symbol.clone(), c)).collect();
        self.agents = agents;
        self.news = NewsGenerator::new(config.news.lambda, symbols);
        self.clock = clock;
        self.global_sentiment = 0.0;
        self.industry_sentiment.clear();
        self.symbol_sentiment.clear();
        self.recent_trades.clear();
        self.config = config;
    }

    /// Clears all engine state (books, candles, news, trades); the
    /// commodities/agents/clock are left as-is (the caller, `Simulation`,
    /// rebuilds them via `reinitialize` if a full reset is wanted).
    pub fn reset(&mut self) {
        for book in self.books.values() {
            book.clear();
        }
        self.candles.reset();
        self.news.reset();
        self.recent_trades.clear();
        self.global_sentiment = 0.0;
        self.industry_sentiment.clear();
        self.symbol_sentiment.clear();
    }
}
