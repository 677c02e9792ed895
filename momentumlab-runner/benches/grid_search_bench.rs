//! Criterion benchmarks for the grid search.
//!
//! Run with: `cargo bench -p momentumlab-runner`
//!
//! - Single combination (simulate + aggregate + result assembly)
//! - Small grid, sequential vs parallel
//! - Synthetic data generation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use momentumlab_core::ParameterCombination;
use momentumlab_runner::{
    generate_synthetic, run_backtest, GridSearch, LoadedData, ParameterGrid, PreparedData,
    SyntheticConfig,
};

fn prepared(tickers: usize, months: usize) -> PreparedData {
    let ds = generate_synthetic(&SyntheticConfig {
        tickers,
        months,
        ..SyntheticConfig::default()
    })
    .unwrap();
    PreparedData::new(LoadedData::new(ds, true), 12).unwrap()
}

/// Benchmark one combination end to end
fn bench_single_combination(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_combination");

    for tickers in [50, 200] {
        let data = prepared(tickers, 120);
        let params = ParameterCombination::default();
        group.bench_with_input(BenchmarkId::from_parameter(tickers), &tickers, |b, _| {
            b.iter(|| run_backtest(black_box(&data), black_box(&params)));
        });
    }

    group.finish();
}

/// Benchmark a 3x2x2x2 grid both ways
fn bench_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(20);

    let data = prepared(50, 120);
    let grid = ParameterGrid::new(vec![6, 12, 18], vec![1, 3], vec![0.1, 0.15], vec![0.1, 0.15]);

    group.bench_function("sequential_24", |b| {
        b.iter(|| {
            GridSearch::new(&grid)
                .with_parallelism(false)
                .run(black_box(&data))
        });
    });
    group.bench_function("parallel_24", |b| {
        b.iter(|| GridSearch::new(&grid).run(black_box(&data)));
    });

    group.finish();
}

/// Benchmark synthetic panel generation
fn bench_synthetic(c: &mut Criterion) {
    let config = SyntheticConfig {
        tickers: 500,
        months: 240,
        ..SyntheticConfig::default()
    };
    c.bench_function("synthetic_500x240", |b| {
        b.iter(|| generate_synthetic(black_box(&config)));
    });
}

criterion_group!(benches, bench_single_combination, bench_grid, bench_synthetic);
criterion_main!(benches);
