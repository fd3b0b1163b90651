//! Bounded in-process tier.
//!
//! Holds `Arc<T>` directly (no encoding) in a size-bounded `moka` cache that
//! evicts least-recently-used entries, with a single time-to-live fixed at
//! construction. The per-call TTL passed to
//! [`Provider::mset`] is ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use crate::cache::error::CacheError;
use crate::cache::key::{Entity, Key};
use crate::cache::provider::{Provider, TierLookup};

/// Default maximum number of entries.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

/// Default time-to-live for every entry.
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(60 * 60);

pub struct MemoryTier<T> {
    entries: Cache<String, Arc<T>>,
    name: String,
}

impl<T: Entity> MemoryTier<T> {
    /// Create a tier holding up to `capacity` entries (0 selects the default).
    pub fn new(capacity: u64) -> Self {
        Self::with_ttl(capacity, DEFAULT_MEMORY_TTL)
    }

    pub fn with_ttl(capacity: u64, ttl: Duration) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_MEMORY_CAPACITY
        } else {
            capacity
        };

        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .time_to_live(ttl)
                .build(),
            name: "memory".to_string(),
        }
    }

    /// Override the label used in logs and metrics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Apply pending evictions; mostly useful in tests.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    fn lookup(&self, cache_key: &str, required_version: u16) -> Option<Arc<T>> {
        self.entries
            .get(cache_key)
            .filter(|item| item.model_version() == required_version)
    }
}

#[async_trait]
impl<T, V> Provider<T, V> for MemoryTier<T>
where
    T: Entity,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &Key<V>, required_version: u16) -> Result<Option<Arc<T>>, CacheError> {
        Ok(self.lookup(key.as_str(), required_version))
    }

    async fn mget(
        &self,
        keys: &[Key<V>],
        required_version: u16,
    ) -> Result<TierLookup<T, V>, CacheError> {
        let mut lookup = TierLookup::new();

        for key in keys {
            match self.lookup(key.as_str(), required_version) {
                Some(item) => {
                    lookup.found.insert(key.clone(), item);
                }
                None => lookup.missing.push(key.clone()),
            }
        }

        Ok(lookup)
    }

    async fn mset(&self, values: &HashMap<String, Arc<T>>, _ttl: Duration) -> Result<(), CacheError> {
        for (key, value) in values {
            self.entries.insert(key.clone(), Arc::clone(value));
        }

        debug!(tier = %self.name, count = values.len(), "Stored values");
        Ok(())
    }
}
