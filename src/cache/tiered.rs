//! Tier orchestrator: read-through lookups across an ordered chain of tiers.
//!
//! Tiers are visited one after another, fastest first. Each tier is only asked
//! about the keys every earlier tier missed; whatever is left goes to the origin
//! in one call. Values found at the origin are written back into the tiers that
//! missed them.
//!
//! - [`TieredCache::get`] backfills synchronously, inside the caller's call.
//! - [`TieredCache::mget`] backfills in the background and only when the origin
//!   was queried and returned something. A key missed by an early tier but hit
//!   by a later one is not promoted into the early tier.
//! - [`TieredCache::mset`] writes to every tier and aggregates failures.
//!
//! Tier read failures are logged and treated as misses. Origin failures fail
//! the whole call, even when some keys were already resolved by tiers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::backfill::{BackfillStats, Backfiller};
use crate::cache::error::{CacheError, SourceError};
use crate::cache::key::{Entity, Key};
use crate::cache::provider::Provider;
use crate::cache::source::DataSource;
use crate::metrics::CacheMetrics;

pub type SharedProvider<T, V> = Arc<dyn Provider<T, V>>;

/// Keys one tier reported missing during a batch lookup.
struct MissedKeys<T: Entity, V: Send + Sync> {
    tier: SharedProvider<T, V>,
    keys: Vec<Key<V>>,
}

/// The orchestrator. Build one with [`CacheBuilder`](crate::cache::builder::CacheBuilder).
pub struct TieredCache<T: Entity, V: Send + Sync> {
    pub(super) tiers: Vec<SharedProvider<T, V>>,
    pub(super) ttl: Duration,
    pub(super) model_version: u16,
    pub(super) metrics: Option<Arc<CacheMetrics>>,
    pub(super) backfiller: Backfiller,
}

impl<T, V> TieredCache<T, V>
where
    T: Entity,
    V: Clone + Send + Sync + 'static,
{
    /// Resolve one key, falling through to `source` when every tier misses.
    ///
    /// Returns `Ok(None)` only when the origin itself has no value.
    pub async fn get<S>(&self, key: &Key<V>, source: &S) -> Result<Option<Arc<T>>, CacheError>
    where
        S: DataSource<T, V> + ?Sized,
    {
        let mut missed_in = Vec::new();
        let mut hit = None;

        for tier in &self.tiers {
            match tier.get(key, self.model_version).await {
                Ok(Some(value)) => {
                    debug!(tier = tier.name(), key = %key, "Cache hit");
                    self.record_lookup(tier.name(), 1, 0);
                    hit = Some(value);
                    break;
                }
                Ok(None) => {
                    self.record_lookup(tier.name(), 0, 1);
                    missed_in.push(tier);
                }
                Err(e) => {
                    warn!(tier = tier.name(), key = %key, "Tier read failed: {e}");
                    self.record_error(tier.name());
                }
            }
        }

        let value = match hit {
            Some(value) => value,
            None => {
                let fetched = source.get_one(key).await;
                self.record_source(&fetched, 1);
                match fetched? {
                    Some(value) => Arc::new(value),
                    None => return Ok(None),
                }
            }
        };

        if !missed_in.is_empty() {
            let values = HashMap::from([(key.cache_key.clone(), Arc::clone(&value))]);
            for tier in missed_in {
                let result = tier.mset(&values, self.ttl).await;
                if let Err(e) = &result {
                    warn!(tier = tier.name(), key = %key, "Backfill failed: {e}");
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_backfill(tier.name(), 1, result.is_ok());
                }
            }
        }

        Ok(Some(value))
    }

    /// Resolve many keys. Keys nobody can resolve are absent from the result.
    ///
    /// Duplicate keys (same `cache_key`) are looked up once.
    pub async fn mget<S>(
        &self,
        keys: &[Key<V>],
        source: &S,
    ) -> Result<HashMap<Key<V>, Arc<T>>, CacheError>
    where
        S: DataSource<T, V> + ?Sized,
    {
        let mut seen = HashSet::with_capacity(keys.len());
        let mut to_query: Vec<Key<V>> = keys
            .iter()
            .filter(|k| seen.insert(k.as_str()))
            .cloned()
            .collect();

        let mut results = HashMap::with_capacity(to_query.len());
        let mut missed_in: Vec<MissedKeys<T, V>> = Vec::new();

        for tier in &self.tiers {
            if to_query.is_empty() {
                break;
            }

            let lookup = match tier.mget(&to_query, self.model_version).await {
                Ok(lookup) => lookup,
                Err(e) => {
                    warn!(tier = tier.name(), keys = to_query.len(), "Tier batch read failed: {e}");
                    self.record_error(tier.name());
                    continue;
                }
            };

            self.record_lookup(tier.name(), lookup.found.len(), lookup.missing.len());
            results.extend(lookup.found);

            if !lookup.missing.is_empty() {
                missed_in.push(MissedKeys {
                    tier: Arc::clone(tier),
                    keys: lookup.missing.clone(),
                });
            }
            to_query = lookup.missing;
        }

        if to_query.is_empty() {
            return Ok(results);
        }

        let fetched = source.get_many(&to_query).await;
        self.record_source(&fetched, to_query.len());
        let from_source: HashMap<Key<V>, Arc<T>> = fetched?
            .into_iter()
            .map(|(k, v)| (k, Arc::new(v)))
            .collect();

        debug!(
            requested = to_query.len(),
            returned = from_source.len(),
            "Fetched from source"
        );

        if !from_source.is_empty() {
            self.schedule_backfill(missed_in, &from_source);
        }

        results.extend(from_source);
        Ok(results)
    }

    /// Write `records` to every tier with the default TTL.
    ///
    /// All tiers are attempted. Any failures come back together as
    /// [`CacheError::Partial`]; the tiers that succeeded keep their writes.
    pub async fn mset<I>(&self, records: I) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = (String, T)>,
    {
        let values: HashMap<String, Arc<T>> = records
            .into_iter()
            .map(|(k, v)| (k, Arc::new(v)))
            .collect();

        let mut failures = Vec::new();
        for tier in &self.tiers {
            if let Err(e) = tier.mset(&values, self.ttl).await {
                warn!(tier = tier.name(), count = values.len(), "Tier write failed: {e}");
                failures.push(CacheError::tier_write(tier.name(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CacheError::Partial(failures))
        }
    }

    /// Wait for every background backfill scheduled so far.
    pub async fn drain_backfills(&self) {
        self.backfiller.drain().await;
    }

    pub fn backfill_stats(&self) -> BackfillStats {
        self.backfiller.stats()
    }

    pub fn model_version(&self) -> u16 {
        self.model_version
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Tier labels in lookup order.
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    fn schedule_backfill(
        &self,
        missed_in: Vec<MissedKeys<T, V>>,
        from_source: &HashMap<Key<V>, Arc<T>>,
    ) {
        for missed in missed_in {
            let values: HashMap<String, Arc<T>> = missed
                .keys
                .iter()
                .filter_map(|k| {
                    from_source
                        .get(k)
                        .map(|v| (k.cache_key.clone(), Arc::clone(v)))
                })
                .collect();

            if values.is_empty() {
                continue;
            }

            let tier = missed.tier;
            let ttl = self.ttl;
            let metrics = self.metrics.clone();

            self.backfiller.spawn(async move {
                let result = tier.mset(&values, ttl).await;
                match &result {
                    Ok(()) => debug!(tier = tier.name(), count = values.len(), "Backfilled"),
                    Err(e) => warn!(tier = tier.name(), count = values.len(), "Backfill failed: {e}"),
                }
                if let Some(metrics) = metrics {
                    metrics.record_backfill(tier.name(), values.len(), result.is_ok());
                }
                result
            });
        }
    }

    fn record_lookup(&self, tier: &str, hits: usize, misses: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_lookup(tier, hits, misses);
        }
    }

    /// Count an origin call unless the source does not implement the lookup.
    fn record_source<R>(&self, fetched: &Result<R, SourceError>, keys: usize) {
        if matches!(fetched, Err(SourceError::Unsupported(_))) {
            return;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_source(keys);
        }
    }

    fn record_error(&self, tier: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error(tier);
        }
    }
}
