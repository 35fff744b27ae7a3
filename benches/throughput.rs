//! Throughput Benchmark for ttlload
//!
//! This benchmark measures record generation and batch insertion into the
//! in-memory collection.

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use ttlload::record::RecordGenerator;
use ttlload::store::card_history_collection;

/// Benchmark generating single records
fn bench_generate(c: &mut Criterion) {
    let now = Utc::now();
    let remove_at = now + Duration::minutes(5);
    let mut generator = RecordGenerator::seeded(1, now, 1000);

    let mut group = c.benchmark_group("generate");
    group.throughput(Throughput::Elements(1));

    group.bench_function("record", |b| {
        let mut i = 1u64;
        b.iter(|| {
            black_box(generator.generate(i, remove_at));
            i += 1;
        });
    });

    group.bench_function("record_to_document", |b| {
        let mut i = 1u64;
        b.iter(|| {
            let record = generator.generate(i, remove_at);
            black_box(record.to_document().ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark unordered batch inserts into a validated collection
fn bench_insert_batch(c: &mut Criterion) {
    let now = Utc::now();
    let remove_at = now + Duration::minutes(5);
    let mut generator = RecordGenerator::seeded(2, now, 1000);

    let mut group = c.benchmark_group("insert");

    for batch_size in [100u64, 1000] {
        group.throughput(Throughput::Elements(batch_size));
        group.bench_function(format!("batch_{}", batch_size), |b| {
            let collection = card_history_collection().expect("collection");
            b.iter_batched(
                || {
                    (1..=batch_size)
                        .filter_map(|i| generator.generate(i, remove_at).to_document().ok())
                        .collect::<Vec<_>>()
                },
                |documents| black_box(collection.insert_documents(documents, false).is_ok()),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark a sweep that removes everything
fn bench_sweep(c: &mut Criterion) {
    let now = Utc::now();
    let mut generator = RecordGenerator::seeded(3, now, 1000);

    let mut group = c.benchmark_group("sweep");
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("expire_10k", |b| {
        b.iter_batched(
            || {
                let collection = card_history_collection().expect("collection");
                let documents = (1..=10_000)
                    .filter_map(|i| generator.generate(i, now).to_document().ok())
                    .collect();
                let _ = collection.insert_documents(documents, false);
                collection
            },
            |collection| black_box(collection.cleanup_expired(now)),
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_generate, bench_insert_batch, bench_sweep);
criterion_main!(benches);
