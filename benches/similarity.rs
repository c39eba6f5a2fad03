//! Benchmarks for the similarity search path: raw vector math, brute-force
//! nearest-neighbor scans over the in-memory store, and the full ranked
//! retrieval query.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use uuid::Uuid;

use ai_hub::search::types::{ChunkRecord, NearestQuery};
use ai_hub::search::vectors::{cosine_distance, cosine_similarity, normalize};
use ai_hub::search::{MemoryVectorStore, VectorStore};

const DIM: usize = 768;

/// Deterministic synthetic embedding, roughly unit-length.
fn synthetic_vector(seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let raw: Vec<f32> = (0..DIM)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / (u32::MAX as f32)) * 2.0 - 1.0
        })
        .collect();
    normalize(&raw)
}

fn seeded_store(chunks: usize) -> Arc<MemoryVectorStore> {
    let store = Arc::new(MemoryVectorStore::new(DIM));
    for i in 0..chunks {
        store
            .insert_chunk(ChunkRecord::new(
                Uuid::new_v4(),
                "bench-user",
                None,
                format!("chunk {}", i),
                synthetic_vector(i as u64),
            ))
            .unwrap();
    }
    store
}

fn bench_vector_math(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_math");
    let a = synthetic_vector(1);
    let b = synthetic_vector(2);

    group.throughput(Throughput::Elements(DIM as u64));
    group.bench_function("cosine_similarity_768d", |bch| {
        bch.iter(|| cosine_similarity(black_box(&a), black_box(&b)).unwrap())
    });
    group.bench_function("cosine_distance_768d", |bch| {
        bch.iter(|| cosine_distance(black_box(&a), black_box(&b)).unwrap())
    });
    group.finish();
}

fn bench_nearest_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest_scan");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let query_vector = synthetic_vector(99_999);

    for corpus in [100usize, 1_000, 10_000] {
        let store = seeded_store(corpus);
        group.throughput(Throughput::Elements(corpus as u64));
        group.bench_with_input(
            BenchmarkId::new("top_10", corpus),
            &corpus,
            |bch, _| {
                bch.to_async(&rt).iter(|| {
                    let store = store.clone();
                    let vector = query_vector.clone();
                    async move {
                        let query = NearestQuery::for_user("bench-user", 10);
                        black_box(store.nearest(&query, &vector).await.unwrap())
                    }
                })
            },
        );
    }
    group.finish();
}

fn bench_filtered_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtered_scan");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = seeded_store(10_000);
    let query_vector = synthetic_vector(99_999);

    // Distance cap 0.3 (score >= 0.7) rejects most random vectors early.
    group.bench_function("top_10_with_distance_cap", |bch| {
        bch.to_async(&rt).iter(|| {
            let store = store.clone();
            let vector = query_vector.clone();
            async move {
                let query = NearestQuery::for_user("bench-user", 10).with_max_distance(0.3);
                black_box(store.nearest(&query, &vector).await.unwrap())
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_vector_math, bench_nearest_scan, bench_filtered_scan);
criterion_main!(benches);
