//! Benchmarks for the tiered cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};

use datasource_cache::cache::codec;
use datasource_cache::{batch_source, CacheBuilder, Entity, Key, MemoryTier, NoSource, Provider};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: u64,
    payload: String,
    model_version: u16,
}

impl Entity for Record {
    fn model_version(&self) -> u16 {
        self.model_version
    }
}

fn record(id: u64) -> Record {
    Record {
        id,
        payload: "x".repeat(256),
        model_version: 1,
    }
}

fn keys(n: u64) -> Vec<Key<u64>> {
    (0..n).map(|id| Key::new(format!("record:{id}"), id)).collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_memory_mget(c: &mut Criterion) {
    let rt = runtime();
    let tier = MemoryTier::<Record>::new(20_000);
    let keys = keys(1_000);
    let values: HashMap<String, Arc<Record>> = keys
        .iter()
        .map(|k| (k.cache_key.clone(), Arc::new(record(k.original_value))))
        .collect();
    rt.block_on(Provider::<Record, u64>::mset(&tier, &values, Duration::from_secs(60)))
        .unwrap();

    c.bench_function("memory_mget_1k_hits", |b| {
        b.to_async(&rt).iter(|| async {
            let lookup = tier.mget(black_box(&keys), 1).await.unwrap();
            black_box(lookup);
        })
    });
}

fn bench_tiered_get_hit(c: &mut Criterion) {
    let rt = runtime();
    let cache = CacheBuilder::<Record, u64>::new(1)
        .with_tier(MemoryTier::new(1_000))
        .build();
    let key = Key::new("record:1", 1u64);
    rt.block_on(cache.mset([(key.cache_key.clone(), record(1))]))
        .unwrap();

    c.bench_function("tiered_get_first_tier_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let value = cache.get(black_box(&key), &NoSource).await.unwrap();
            black_box(value);
        })
    });
}

fn bench_tiered_mget_cold(c: &mut Criterion) {
    let rt = runtime();
    let keys = keys(250);
    let source = batch_source(|keys: Vec<Key<u64>>| async move {
        Ok::<_, anyhow::Error>(
            keys.into_iter()
                .map(|k| {
                    let value = record(k.original_value);
                    (k, value)
                })
                .collect::<HashMap<_, _>>(),
        )
    });

    // A fresh tier each iteration keeps every lookup a full miss.
    c.bench_function("tiered_mget_250_cold_with_backfill", |b| {
        b.to_async(&rt).iter(|| async {
            let cache = CacheBuilder::<Record, u64>::new(1)
                .with_tier(MemoryTier::new(1_000))
                .build();
            let found = cache.mget(black_box(&keys), &source).await.unwrap();
            cache.drain_backfills().await;
            black_box(found);
        })
    });
}

fn bench_codec(c: &mut Criterion) {
    let value = record(42);
    let bytes = codec::encode(&value).unwrap();

    c.bench_function("msgpack_encode_record", |b| {
        b.iter(|| black_box(codec::encode(black_box(&value)).unwrap()))
    });

    c.bench_function("msgpack_decode_record", |b| {
        b.iter(|| {
            let decoded: Record = codec::decode(black_box(&bytes)).unwrap();
            black_box(decoded);
        })
    });
}

criterion_group!(
    benches,
    bench_memory_mget,
    bench_tiered_get_hit,
    bench_tiered_mget_cold,
    bench_codec,
);
criterion_main!(benches);
