//! Benchmark for PersistentVector vs standard Vec.
//!
//! Compares push_back, random access and range iteration, and shows how the
//! branching exponent trades trie depth against copy size.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use datoms::persistent::PersistentVector;
use std::hint::black_box;

// =============================================================================
// push_back Benchmark
// =============================================================================

fn benchmark_push_back(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("push_back");

    for size in [100, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut vector = PersistentVector::new();
                    for index in 0..size {
                        vector = vector.push_back(black_box(index));
                    }
                    black_box(vector)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("Vec", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut vector = Vec::new();
                for index in 0..size {
                    vector.push(black_box(index));
                }
                black_box(vector)
            });
        });
    }

    group.finish();
}

// =============================================================================
// get Benchmark (Random Access)
// =============================================================================

fn benchmark_get(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("get");

    for size in [100, 1000, 10000] {
        let persistent_vector: PersistentVector<usize> = (0..size).collect();
        let standard_vector: Vec<usize> = (0..size).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut sum = 0;
                    for index in 0..size {
                        if let Some(&value) = persistent_vector.get(black_box(index)) {
                            sum += value;
                        }
                    }
                    black_box(sum)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("Vec", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut sum = 0;
                for index in 0..size {
                    if let Some(&value) = standard_vector.get(black_box(index)) {
                        sum += value;
                    }
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

// =============================================================================
// Branching Exponent Benchmark
// =============================================================================

fn benchmark_bits(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("bits");
    let size = 10_000;

    for bits in [2, 3, 4, 5, 6, 8] {
        group.bench_with_input(BenchmarkId::new("push_back", bits), &bits, |bencher, &bits| {
            bencher.iter(|| {
                let mut vector = PersistentVector::with_bits(bits);
                for index in 0..size {
                    vector = vector.push_back(black_box(index));
                }
                black_box(vector)
            });
        });

        let vector = (0..size).fold(PersistentVector::with_bits(bits), |vector, index| {
            vector.push_back(index)
        });
        group.bench_with_input(BenchmarkId::new("get", bits), &bits, |bencher, _| {
            bencher.iter(|| {
                let mut sum = 0;
                for index in 0..size {
                    sum += vector[black_box(index)];
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

// =============================================================================
// Iteration Benchmark
// =============================================================================

fn benchmark_iteration(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("iteration");

    for size in [1000, 100_000] {
        let persistent_vector: PersistentVector<usize> = (0..size).collect();
        let standard_vector: Vec<usize> = (0..size).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, _| {
                bencher.iter(|| black_box(persistent_vector.iter().sum::<usize>()));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentVector::range", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| black_box(persistent_vector.range(size / 4, size / 2).sum::<usize>()));
            },
        );

        group.bench_with_input(BenchmarkId::new("Vec", size), &size, |bencher, _| {
            bencher.iter(|| black_box(standard_vector.iter().sum::<usize>()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_push_back,
    benchmark_get,
    benchmark_bits,
    benchmark_iteration
);

criterion_main!(benches);
