//! Poisson-timed news shocks with an injection queue and bounded history.

use std::collections::VecDeque;

use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};

/// Reference history size (spec.md §4.5: "reference size ~10,000").
pub const MAX_NEWS_HISTORY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsCategory {
    Global,
    Political,
    Supply,
    Demand,
    Company,
    Industry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub category: NewsCategory,
    pub sentiment: Sentiment,
    pub magnitude: f64,
    /// Present iff `category` is commodity/industry-specific (supply,
    /// demand, company, industry).
    pub target: Option<String>,
    pub headline: String,
    pub timestamp: i64,
}

/// Per-category magnitude sigma for the truncated-Gaussian draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSigmas {
    pub global: f64,
    pub political: f64,
    pub supply: f64,
    pub demand: f64,
    pub industry: f64,
    pub company: f64,
}

impl Default for NewsSigmas {
    fn default() -> Self {
        Self { global: 0.15, political: 0.2, supply: 0.25, demand: 0.25, industry: 0.2, company: 0.3 }
    }
}

/// Configured relative likelihood of each category at spontaneous-event
/// sampling time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub global: f64,
    pub political: f64,
    pub supply: f64,
    pub demand: f64,
    pub industry: f64,
    pub company: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self { global: 1.0, political: 1.0, supply: 1.0, demand: 1.0, industry: 1.0, company: 1.0 }
    }
}

pub struct NewsGenerator {
    lambda: f64,
    sigmas: NewsSigmas,
    weights: CategoryWeights,
    targets: Vec<String>,
    injection_queue: VecDeque<NewsEvent>,
    history: VecDeque<NewsEvent>,
}

impl NewsGenerator {
    pub fn new(lambda: f64, targets: Vec<String>) -> Self {
        Self {
            lambda,
            sigmas: NewsSigmas::default(),
            weights: CategoryWeights::default(),
            targets,
            injection_queue: VecDeque::new(),
            history: VecDeque::new(),
        }
    }

    pub fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
    }

    pub fn set_sigmas(&mut self, sigmas: NewsSigmas) {
        self.sigmas = sigmas;
    }

    pub fn set_weights(&mut self, weights: CategoryWeights) {
        self.weights = weights;
    }

    pub fn inject(
        &mut self,
        category: NewsCategory,
        sentiment: Sentiment,
        magnitude: f64,
        target: Option<String>,
        headline: Option<String>,
    ) {
        let headline = headline.unwrap_or_else(|| template_headline(category, sentiment, target.as_deref()));
        self.injection_queue.push_back(NewsEvent { category, sentiment, magnitude, target, headline, timestamp: 0 });
    }

    /// Drains the injection queue, then samples spontaneous events from a
    /// Poisson process scaled by `tick_scale`. Both flow into the bounded
    /// history and the returned per-tick event list.
    pub fn tick(&mut self, tick_scale: f64, sim_time: i64, rng: &mut impl Rng) -> Vec<NewsEvent> {
        let mut events = Vec::new();

        while let Some(mut event) = self.injection_queue.pop_front() {
            event.timestamp = sim_time;
            self.push_history(event.clone());
            events.push(event);
        }

        let rate = (self.lambda * tick_scale).max(0.0);
        let count = if rate > 0.0 {
            Poisson::new(rate).map(|p| p.sample(rng) as u64).unwrap_or(0)
        } else {
            0
        };

        for _ in 0..count {
            let category = self.sample_category(rng);
            let target = self.sample_target(category, rng);
            let sentiment = match rng.gen_range(0..3) {
                0 => Sentiment::Positive,
                1 => Sentiment::Negative,
                _ => Sentiment::Neutral,
            };
            let sigma = self.sigma_for(category);
            let magnitude = truncated_gaussian(sigma, rng);
            let headline = template_headline(category, sentiment, target.as_deref());
            let event = NewsEvent { category, sentiment, magnitude, target, headline, timestamp: sim_time };
            self.push_history(event.clone());
            events.push(event);
        }

        events
    }

    fn push_history(&mut self, event: NewsEvent) {
        if self.history.len() >= MAX_NEWS_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }

    fn sigma_for(&self, category: NewsCategory) -> f64 {
        match category {
            NewsCategory::Global => self.sigmas.global,
            NewsCategory::Political => self.sigmas.political,
            NewsCategory::Supply => self.sigmas.supply,
            NewsCategory::Demand => self.sigmas.demand,
            NewsCategory::Industry => self.sigmas.industry,
            NewsCategory::Company => self.sigmas.company,
        }
    }

    fn sample_category(&self, rng: &mut impl Rng) -> NewsCategory {
        let w = &self.weights;
        let total = w.global + w.political + w.supply + w.demand + w.industry + w.company;
        if total <= 0.0 {
            return NewsCategory::Global;
        }
        let mut roll = rng.gen_range(0.0..total);
        for (weight, category) in [
            (w.global, NewsCategory::Global),
            (w.political, NewsCategory::Political),
            (w.supply, NewsCategory::Supply),
            (w.demand, NewsCategory::Demand),
            (w.industry, NewsCategory::Industry),
            (w.company, NewsCategory::Company),
        ] {
            if roll < weight {
                return category;
            }
            roll -= weight;
        }
        NewsCategory::Global
    }

    fn sample_target(&self, category: NewsCategory, rng: &mut impl Rng) -> Option<String> {
        let needs_target = matches!(
            category,
            NewsCategory::Supply | NewsCategory::Demand | NewsCategory::Company | NewsCategory::Industry
        );
        if !needs_target || self.targets.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.targets.len());
        Some(self.targets[idx].clone())
    }

    pub fn history(&self, limit: usize) -> Vec<NewsEvent> {
        let start = self.history.len().saturating_sub(limit);
        self.history.iter().skip(start).cloned().collect()
    }

    pub fn reset(&mut self) {
        self.injection_queue.clear();
        self.history.clear();
    }
}

/// Gaussian magnitude draw, clamped to `[0, 1]` per spec.md §3
/// (`magnitude [0,1]`).
fn truncated_gaussian(sigma: f64, rng: &mut impl Rng) -> f64 {
    let normal = Normal::new(0.0, sigma).unwrap_or_else(|_| Normal::new(0.0, 1e-9).unwrap());
    normal.sample(rng).abs().min(1.0)
}

fn template_headline(category: NewsCategory, sentiment: Sentiment, target: Option<&str>) -> String {
    let tone = match sentiment {
        Sentiment::Positive => "boosts outlook for",
        Sentiment::Negative => "weighs on outlook for",
        Sentiment::Neutral => "leaves outlook unchanged for",
    };
    let subject = target.unwrap_or("global markets");
    match category {
        NewsCategory::Global => format!("Macro update {} {}", tone, subject),
        NewsCategory::Political => format!("Policy shift {} {}", tone, subject),
        NewsCategory::Supply => format!("Supply disruption report {} {}", tone, subject),
        NewsCategory::Demand => format!("Demand outlook report {} {}", tone, subject),
        NewsCategory::Company => format!("Company earnings update {} {}", tone, subject),
        NewsCategory::Industry => format!("Industry survey {} {}", tone, subject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn injected_events_drain_fifo_and_carry_sim_time() {
        let mut gen = NewsGenerator::new(0.0, vec!["XAU".into()]);
        gen.inject(NewsCategory::Supply, Sentiment::Negative, 0.3, Some("XAU".into()), None);
        gen.inject(NewsCategory::Demand, Sentiment::Positive, 0.4, Some("XAU".into()), None);

        let mut rng = StdRng::seed_from_u64(1);
        let events = gen.tick(1.0, 555, &mut rng);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].category, NewsCategory::Supply);
        assert_eq!(events[1].category, NewsCategory::Demand);
        assert!(events.iter().all(|e| e.timestamp == 555));
    }

    #[test]
    fn magnitude_is_always_finite_and_bounded() {
        let mut gen = NewsGenerator::new(5.0, vec!["XAU".into()]);
        let mut rng = StdRng::seed_from_u64(2);
        let events = gen.tick(1.0, 0, &mut rng);
        for e in events {
            assert!(e.magnitude.is_finite());
            assert!((0.0..=1.0).contains(&e.magnitude));
        }
    }

    #[test]
    fn global_and_political_events_carry_no_target() {
        let mut gen = NewsGenerator::new(50.0, vec!["XAU".into()]);
        let mut rng = StdRng::seed_from_u64(3);
        let events = gen.tick(1.0, 0, &mut rng);
        for e in events {
            let expects_target = matches!(
                e.category,
                NewsCategory::Supply | NewsCategory::Demand | NewsCategory::Company | NewsCategory::Industry
            );
            assert_eq!(e.target.is_some(), expects_target);
        }
    }

    #[test]
    fn history_is_bounded() {
        let mut gen = NewsGenerator::new(0.0, vec![]);
        for i in 0..(MAX_NEWS_HISTORY + 5) {
            gen.inject(NewsCategory::Global, Sentiment::Neutral, 0.1, None, None);
            let mut rng = StdRng::seed_from_u64(i as u64);
            gen.tick(0.0, i as i64, &mut rng);
        }
        assert_eq!(gen.history(usize::MAX).len(), MAX_NEWS_HISTORY);
    }
}
