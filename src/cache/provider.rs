//! The capability every cache tier implements.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::error::CacheError;
use crate::cache::key::{Entity, Key};

/// Result of a batch lookup against one tier.
///
/// Every requested key lands in exactly one of `found` or `missing`.
#[derive(Debug)]
pub struct TierLookup<T, V> {
    pub found: HashMap<Key<V>, Arc<T>>,
    pub missing: Vec<Key<V>>,
}

impl<T, V> TierLookup<T, V> {
    pub fn new() -> Self {
        Self {
            found: HashMap::new(),
            missing: Vec::new(),
        }
    }

    /// All requested keys were resolved by this tier.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Fold another partial lookup into this one.
    pub fn merge(&mut self, other: TierLookup<T, V>) {
        self.found.extend(other.found);
        self.missing.extend(other.missing);
    }
}

impl<T, V> Default for TierLookup<T, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single cache tier.
///
/// Providers are built once and shared across concurrent calls, so they must
/// hold no per-call mutable state and be safe to use from many tasks.
#[async_trait]
pub trait Provider<T: Entity, V: Send + Sync>: Send + Sync {
    /// Short label used in logs and metrics.
    fn name(&self) -> &str;

    /// Look up one key. `Ok(None)` covers both "absent" and "stale version".
    async fn get(&self, key: &Key<V>, required_version: u16) -> Result<Option<Arc<T>>, CacheError>;

    /// Partition `keys` into values with a matching version and everything else.
    async fn mget(
        &self,
        keys: &[Key<V>],
        required_version: u16,
    ) -> Result<TierLookup<T, V>, CacheError>;

    /// Store values keyed by their `cache_key`.
    ///
    /// Items that cannot be encoded are skipped; the rest are still written.
    async fn mset(&self, values: &HashMap<String, Arc<T>>, ttl: Duration) -> Result<(), CacheError>;
}
