//! Throughput benchmarks comparing the three ordered-set implementations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ordered_set::{LockFreeSkipList, OptimisticSkipList, OrderedSet, RelaxedBst};

fn populated<S: OrderedSet>(size: u64) -> S {
    let set = S::new();
    for i in 0..size {
        set.insert(i, i + 1);
    }
    set
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for size in [100u64, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("lock_free", size), size, |b, &size| {
            b.iter(|| {
                let set = LockFreeSkipList::new();
                for i in 0..size {
                    black_box(set.insert(i, i + 1));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("optimistic", size), size, |b, &size| {
            b.iter(|| {
                let set = OptimisticSkipList::new();
                for i in 0..size {
                    black_box(set.insert(i, i + 1));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("relaxed_bst", size), size, |b, &size| {
            b.iter(|| {
                let set = RelaxedBst::new();
                for i in 0..size {
                    black_box(set.insert(i, i + 1));
                }
            });
        });
    }
    group.finish();
}

fn bench_find_existing(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_existing");
    for size in [100u64, 1_000, 10_000].iter() {
        let lf: LockFreeSkipList = populated(*size);
        let opt: OptimisticSkipList = populated(*size);
        let bst: RelaxedBst = populated(*size);

        group.bench_with_input(BenchmarkId::new("lock_free", size), size, |b, &size| {
            b.iter(|| black_box(lf.find(size / 2)));
        });
        group.bench_with_input(BenchmarkId::new("optimistic", size), size, |b, &size| {
            b.iter(|| black_box(opt.find(size / 2)));
        });
        group.bench_with_input(BenchmarkId::new("relaxed_bst", size), size, |b, &size| {
            b.iter(|| black_box(bst.find(size / 2)));
        });
    }
    group.finish();
}

fn bench_mixed_concurrent(c: &mut Criterion) {
    use std::sync::Arc;
    use std::thread;

    c.bench_function("lock_free_8_threads_mixed", |b| {
        b.iter(|| {
            let set = Arc::new(LockFreeSkipList::new());
            let handles: Vec<_> = (0..8u64)
                .map(|t| {
                    let set = Arc::clone(&set);
                    thread::spawn(move || {
                        for i in 0..200u64 {
                            let key = t * 200 + i;
                            set.insert(key, key + 1);
                            black_box(set.find(key));
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });
    });

    c.bench_function("optimistic_8_threads_mixed", |b| {
        b.iter(|| {
            let set = Arc::new(OptimisticSkipList::new());
            let handles: Vec<_> = (0..8u64)
                .map(|t| {
                    let set = Arc::clone(&set);
                    thread::spawn(move || {
                        for i in 0..200u64 {
                            let key = t * 200 + i;
                            set.insert(key, key + 1);
                            black_box(set.find(key));
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_find_existing,
    bench_mixed_concurrent
);
criterion_main!(benches);
