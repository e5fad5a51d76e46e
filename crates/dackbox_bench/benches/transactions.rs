//! Transaction and graph view benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dackbox_bench::{bucket_keys, populate, random_data, sample_keys};
use dackbox_core::{Config, DackBox, RGraph};
use dackbox_storage::InMemoryStore;
use std::sync::Arc;

fn open_memory() -> DackBox {
    DackBox::open(Arc::new(InMemoryStore::new()), None, Config::default()).unwrap()
}

/// Benchmark committing a transaction that rewrites edges.
fn bench_commit_edges(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_edges");

    for batch_size in [1, 10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let dackbox = open_memory();
                let parents = bucket_keys("parent", batch_size);
                let children = bucket_keys("child", 1000);

                b.iter(|| {
                    let mut txn = dackbox.new_transaction().unwrap();
                    for parent in &parents {
                        txn.graph_mut().set_refs(parent, sample_keys(&children, 8));
                    }
                    txn.commit().unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark committing values alongside dirty markers.
fn bench_commit_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_values");

    for size in [64, 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let dackbox = open_memory();
            let keys = bucket_keys("objects", 100);
            let data = random_data(size);

            b.iter(|| {
                let mut txn = dackbox.new_transaction().unwrap();
                for key in &keys {
                    txn.set(key, black_box(&data)).unwrap();
                    txn.mark_dirty(key, None).unwrap();
                }
                txn.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark reads through a graph view over a populated graph.
fn bench_view_reads(c: &mut Criterion) {
    let dackbox = open_memory();
    populate(&dackbox, 1000, 5000, 16);
    let parents = sample_keys(&bucket_keys("parent", 1000), 64);
    let children = sample_keys(&bucket_keys("child", 5000), 64);

    let mut group = c.benchmark_group("view_reads");
    group.throughput(Throughput::Elements(64));
    group.bench_function("refs_from", |b| {
        let view = dackbox.new_graph_view();
        b.iter(|| {
            for parent in &parents {
                black_box(view.get_refs_from(black_box(parent)));
            }
        });
    });
    group.bench_function("refs_to", |b| {
        let view = dackbox.new_graph_view();
        b.iter(|| {
            for child in &children {
                black_box(view.get_refs_to(black_box(child)));
            }
        });
    });
    group.finish();
}

/// Benchmark transaction graph reads, which pull state into the local overlay.
fn bench_transaction_reads(c: &mut Criterion) {
    let dackbox = open_memory();
    populate(&dackbox, 1000, 5000, 16);
    let parents = sample_keys(&bucket_keys("parent", 1000), 64);

    c.bench_function("transaction_refs_from", |b| {
        b.iter(|| {
            let txn = dackbox.new_read_only_transaction().unwrap();
            for parent in &parents {
                black_box(txn.graph().count_refs_from(parent));
            }
        });
    });
}

/// Benchmark reading while older views hold history alive.
fn bench_held_history(c: &mut Criterion) {
    let dackbox = open_memory();
    populate(&dackbox, 100, 1000, 8);
    let _held = dackbox.new_graph_view();
    let parents = bucket_keys("parent", 100);
    let children = bucket_keys("child", 1000);
    for _ in 0..50 {
        let mut txn = dackbox.new_transaction().unwrap();
        for parent in sample_keys(&parents, 4) {
            txn.graph_mut().add_refs(&parent, sample_keys(&children, 2));
        }
        txn.commit().unwrap();
    }

    c.bench_function("view_over_50_modifications", |b| {
        b.iter(|| {
            let view = dackbox.new_graph_view();
            for parent in &parents {
                black_box(view.count_refs_from(parent));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_commit_edges,
    bench_commit_values,
    bench_view_reads,
    bench_transaction_reads,
    bench_held_history,
);
criterion_main!(benches);
