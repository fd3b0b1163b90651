//! datasource-cache demo.
//!
//! Wires an in-process tier and, when configured, a Redis tier in front of a
//! synthetic origin, then runs a few lookups and prints the resulting metrics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use datasource_cache::cache::redis::connect as connect_redis;
use datasource_cache::config::{Cli, Config};
use datasource_cache::metrics::CacheMetrics;
use datasource_cache::{
    batch_source, single_source, CacheBuilder, Entity, Key, MemoryTier, RedisTier,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Product {
    id: u64,
    name: String,
    model_version: u16,
}

impl Entity for Product {
    fn model_version(&self) -> u16 {
        self.model_version
    }
}

fn product_key(id: u64) -> Key<u64> {
    Key::new(format!("product:{id}"), id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "datasource_cache=debug"
    } else {
        "datasource_cache=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("datasource-cache v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)?.with_cli(&cli);
    info!(
        model_version = config.cache.model_version,
        default_ttl_secs = config.cache.default_ttl_secs,
        memory = config.memory.enabled,
        redis = config.redis.url.is_some(),
        "Configuration loaded"
    );

    let registry = prometheus::Registry::new();
    let metrics = Arc::new(CacheMetrics::registered(&registry)?);

    let mut builder = CacheBuilder::<Product, u64>::from_settings(&config.cache)
        .with_metrics(Arc::clone(&metrics));

    if config.memory.enabled {
        builder = builder.with_tier(MemoryTier::with_ttl(
            config.memory.capacity,
            Duration::from_secs(config.memory.ttl_secs),
        ));
    }

    if let Some(url) = &config.redis.url {
        match connect_redis(url).await {
            Ok(conn) => {
                info!(url = %url, chunk_size = config.redis.chunk_size, "Redis tier enabled");
                let tier = RedisTier::<Product, _>::new(conn).with_chunk_size(config.redis.chunk_size);
                builder = builder.with_tier(tier);
            }
            Err(e) => warn!(url = %url, "Redis unavailable, continuing without it: {e}"),
        }
    }

    let cache = builder.build();
    info!(tiers = ?cache.tier_names(), "Cache built");

    let model_version = cache.model_version();
    let origin_hits = Arc::new(AtomicUsize::new(0));

    let single = {
        let origin_hits = Arc::clone(&origin_hits);
        single_source(move |key: Key<u64>| {
            let origin_hits = Arc::clone(&origin_hits);
            async move {
                origin_hits.fetch_add(1, Ordering::Relaxed);
                Ok::<_, anyhow::Error>(Some(Product {
                    id: key.original_value,
                    name: format!("Product {}", key.original_value),
                    model_version,
                }))
            }
        })
    };

    let batch = {
        let origin_hits = Arc::clone(&origin_hits);
        batch_source(move |keys: Vec<Key<u64>>| {
            let origin_hits = Arc::clone(&origin_hits);
            async move {
                origin_hits.fetch_add(keys.len(), Ordering::Relaxed);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, anyhow::Error>(keys
                    .into_iter()
                    .map(|key| {
                        let product = Product {
                            id: key.original_value,
                            name: format!("Product {}", key.original_value),
                            model_version,
                        };
                        (key, product)
                    })
                    .collect::<HashMap<_, _>>())
            }
        })
    };

    // Single key: the first call misses everywhere, the second is served by a tier.
    let key = product_key(1);
    for attempt in 1..=2 {
        let start = Instant::now();
        let product = cache.get(&key, &single).await?;
        info!(
            attempt,
            found = product.is_some(),
            elapsed_us = start.elapsed().as_micros() as u64,
            origin_keys = origin_hits.load(Ordering::Relaxed),
            "Single lookup"
        );
    }

    if let Err(e) = cache
        .mset([
            (product_key(2).cache_key, Product { id: 2, name: "Seeded 2".into(), model_version }),
            (product_key(3).cache_key, Product { id: 3, name: "Seeded 3".into(), model_version }),
        ])
        .await
    {
        warn!(failed = e.failures().len(), "Seeding was partial: {e}");
    }

    // Batch: cold pass goes to the origin and backfills, warm pass should not.
    let keys: Vec<Key<u64>> = (1..=cli.entities as u64).map(product_key).collect();
    for pass in ["cold", "warm"] {
        let before = origin_hits.load(Ordering::Relaxed);
        let start = Instant::now();
        let found = cache.mget(&keys, &batch).await?;
        cache.drain_backfills().await;
        info!(
            pass,
            requested = keys.len(),
            found = found.len(),
            origin_keys = origin_hits.load(Ordering::Relaxed) - before,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Batch lookup"
        );
    }

    let stats = cache.backfill_stats();
    info!(
        scheduled = stats.total_scheduled,
        completed = stats.total_completed,
        failed = stats.total_failed,
        "Backfill stats"
    );

    let text = prometheus::TextEncoder::new().encode_to_string(&registry.gather())?;
    println!("{text}");

    Ok(())
}
