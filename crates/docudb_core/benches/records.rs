//! Record store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docudb_core::{Operator, StorageKind};
use docudb_testkit::record;
use docudb_testkit::scenarios::{create_collection, populated_orders, with_orders};
use docudb_testkit::TestEngine;
use serde_json::json;

/// Benchmark single record inserts into an on-disk and a memory collection.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(1));

    for storage in [StorageKind::OnDisk, StorageKind::InMemoryNonDurable] {
        group.bench_with_input(
            BenchmarkId::from_parameter(storage.as_str()),
            &storage,
            |b, storage| {
                let engine = TestEngine::new();
                let mut schema = docudb_testkit::scenarios::orders_schema();
                schema["meta"]["type"] = json!(storage.as_str());
                create_collection(&engine, "shop", "orders", &schema);
                let payload = record(json!({"status": "new", "total": 19.99}));

                b.iter(|| {
                    engine
                        .records()
                        .insert("shop", "orders", black_box(&payload))
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

/// Benchmark equality and range selects on populated collections.
fn bench_select_with_pattern(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_with_pattern");

    for count in [100, 1000] {
        let (engine, _) = populated_orders(count);
        // Build the lazy index on `total` outside the measurement.
        engine
            .records()
            .select_keys_with_pattern("shop", "orders", "total", &json!(0), Operator::Gt)
            .unwrap();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("eq", count), &count, |b, _| {
            b.iter(|| {
                let records: Vec<_> = engine
                    .records()
                    .select_with_pattern("shop", "orders", "status", black_box(&json!("paid")), Operator::Eq)
                    .unwrap()
                    .collect();
                black_box(records);
            });
        });
        group.bench_with_input(BenchmarkId::new("range", count), &count, |b, &count| {
            let half = json!(count * 5);
            b.iter(|| {
                let keys = engine
                    .records()
                    .select_keys_with_pattern("shop", "orders", "total", black_box(&half), Operator::Gt)
                    .unwrap();
                black_box(keys);
            });
        });
    }
    group.finish();
}

/// Benchmark primary key reads.
fn bench_select(c: &mut Criterion) {
    let engine = TestEngine::new();
    with_orders(&engine);
    let stored = engine
        .records()
        .insert("shop", "orders", &record(json!({"_id": "o-1", "status": "new"})))
        .unwrap();
    black_box(stored);

    c.bench_function("select", |b| {
        b.iter(|| {
            engine
                .records()
                .select("shop", "orders", black_box("o-1"), None)
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_insert, bench_select_with_pattern, bench_select);

criterion_main!(benches);
