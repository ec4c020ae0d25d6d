//! Benchmark for PersistentHashMap vs standard HashMap.
//!
//! Hashes are precomputed with `KeyHasher` outside the measured loops so
//! that only trie work is timed.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use datoms::hash::KeyHasher;
use datoms::persistent::PersistentHashMap;
use std::collections::HashMap;
use std::hint::black_box;

fn keyed(size: i64) -> Vec<(i64, u64)> {
    let hasher = KeyHasher::with_seeds(1, 2, 3, 4);
    (0..size).map(|key| (key, hasher.int(key))).collect()
}

// =============================================================================
// insert Benchmark
// =============================================================================

fn benchmark_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("insert");

    for size in [100, 1000, 10000] {
        let keys = keyed(size);

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &keys,
            |bencher, keys| {
                bencher.iter(|| {
                    let mut map = PersistentHashMap::new();
                    for &(key, hash) in keys {
                        map = map.insert(black_box(key), hash, key);
                    }
                    black_box(map)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &keys, |bencher, keys| {
            bencher.iter(|| {
                let mut map = HashMap::new();
                for &(key, _) in keys {
                    map.insert(black_box(key), key);
                }
                black_box(map)
            });
        });
    }

    group.finish();
}

// =============================================================================
// get Benchmark
// =============================================================================

fn benchmark_get(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("get");

    for size in [100, 1000, 10000] {
        let keys = keyed(size);
        let persistent_map: PersistentHashMap<i64, i64> =
            keys.iter().map(|&(key, hash)| (key, hash, key)).collect();
        let standard_map: HashMap<i64, i64> = keys.iter().map(|&(key, _)| (key, key)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &keys,
            |bencher, keys| {
                bencher.iter(|| {
                    let mut sum = 0;
                    for (key, hash) in keys {
                        if let Some(&value) = persistent_map.get(black_box(key), *hash) {
                            sum += value;
                        }
                    }
                    black_box(sum)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &keys, |bencher, keys| {
            bencher.iter(|| {
                let mut sum = 0;
                for (key, _) in keys {
                    if let Some(&value) = standard_map.get(black_box(key)) {
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
// remove Benchmark
// =============================================================================

fn benchmark_remove(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("remove");

    for size in [100, 1000, 10000] {
        let keys = keyed(size);
        let persistent_map: PersistentHashMap<i64, i64> =
            keys.iter().map(|&(key, hash)| (key, hash, key)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &keys,
            |bencher, keys| {
                bencher.iter(|| {
                    let mut map = persistent_map.clone();
                    for (key, hash) in keys {
                        map = map.remove(black_box(key), *hash);
                    }
                    black_box(map)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Iteration Benchmark
// =============================================================================

fn benchmark_iteration(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("iteration");

    for size in [1000, 100_000] {
        let persistent_map: PersistentHashMap<i64, i64> =
            keyed(size).into_iter().map(|(key, hash)| (key, hash, key)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, _| {
                bencher.iter(|| black_box(persistent_map.values().sum::<i64>()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_insert,
    benchmark_get,
    benchmark_remove,
    benchmark_iteration
);

criterion_main!(benches);
