//! Monthly step cost across the exact and approximate regimes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use warren::{
    counter::BigCount,
    engine::{EngineBuilder, EngineSettings},
    grid::CohortGrid,
    params::{ModelConfig, ParameterSet},
    sampling::Anomalies,
    systems::{age_population, reproduce},
};

fn params() -> ParameterSet {
    ParameterSet::derive(&ModelConfig::default()).expect("default parameters")
}

fn benchmark_simulate_year(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate_year");
    group.sample_size(20);

    for founders in [10u64, 1_000, 1_000_000].iter() {
        let count = BigCount::from_u64(*founders);
        let mut engine = EngineBuilder::new(EngineSettings::new("bench", 42), params())
            .with_demography()
            .build();
        let world = engine.found_world(&count, &count);

        group.bench_with_input(BenchmarkId::new("founders", founders), founders, |b, _| {
            b.iter(|| {
                let mut world = world.clone();
                engine.simulate_year(&mut world).expect("year succeeds");
                black_box(world.total_population())
            });
        });
    }

    group.finish();
}

fn benchmark_month_passes(c: &mut Criterion) {
    let params = params();
    let mut grid = CohortGrid::new();
    for month in 0..12 {
        let cell = grid.cohort_mut(2, month);
        cell.males = BigCount::from_u64(5_000_000);
        cell.females[5] = BigCount::from_u64(5_000_000);
    }
    grid.cohort_mut(0, 6).babies = BigCount::from_u64(40_000_000);
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    c.bench_function("reproduce_large_grid", |b| {
        b.iter(|| {
            let mut grid = grid.clone();
            let mut anomalies = Anomalies::default();
            black_box(reproduce(&mut grid, &params, &mut rng, &mut anomalies))
        });
    });

    c.bench_function("age_large_grid", |b| {
        b.iter(|| {
            let mut grid = grid.clone();
            let mut anomalies = Anomalies::default();
            age_population(&mut grid, &params, &mut rng, &mut anomalies);
            black_box(grid)
        });
    });
}

criterion_group!(benches, benchmark_simulate_year, benchmark_month_passes);
criterion_main!(benches);
