//! Engine tick throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use market_core::engine::MarketEngine;
use market_core::testing::{test_config, test_world};

fn bench_single_tick(c: &mut Criterion) {
    let config = test_config();
    let (clock, commodities, agents) = test_world(&config);
    let mut engine = MarketEngine::new(clock, commodities, agents, config, 7);

    c.bench_function("engine_tick", |b| {
        b.iter(|| {
            black_box(engine.tick());
        });
    });
}

fn bench_tick_with_population(c: &mut Criterion) {
    use market_agents::build_population;

    let mut group = c.benchmark_group("engine_tick_population");
    for &n in &[10usize, 50, 200] {
        let config = test_config();
        let (clock, commodities, _) = test_world(&config);
        let symbols: Vec<String> = commodities.iter().map(|c| c.symbol.clone()).collect();
        let mut sized_config = config.clone();
        sized_config.agent_counts.fundamental = (n / 2) as u32;
        sized_config.agent_counts.noise = (n - n / 2) as u32;
        let agents = build_population(&sized_config, &symbols, 11);
        let mut engine = MarketEngine::new(clock, commodities, agents, sized_config, 11);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                black_box(engine.tick());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_tick, bench_tick_with_population);
criterion_main!(benches);
