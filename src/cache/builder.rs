//! Assembles a [`TieredCache`]: tier order, default TTL and required model version.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::backfill::Backfiller;
use crate::cache::key::Entity;
use crate::cache::provider::Provider;
use crate::cache::tiered::{SharedProvider, TieredCache};
use crate::config::CacheSettings;
use crate::metrics::CacheMetrics;

/// TTL applied to writes issued by the orchestrator unless overridden.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

pub struct CacheBuilder<T: Entity, V: Send + Sync> {
    tiers: Vec<SharedProvider<T, V>>,
    ttl: Duration,
    model_version: u16,
    metrics: Option<Arc<CacheMetrics>>,
    backfill_limit: Option<usize>,
}

impl<T, V> CacheBuilder<T, V>
where
    T: Entity,
    V: Clone + Send + Sync + 'static,
{
    /// Start a builder whose lookups require `model_version`.
    pub fn new(model_version: u16) -> Self {
        Self {
            tiers: Vec::new(),
            ttl: DEFAULT_TTL,
            model_version,
            metrics: None,
            backfill_limit: None,
        }
    }

    /// Start from configured settings.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let mut builder = Self::new(settings.model_version).with_ttl(settings.default_ttl());
        builder.backfill_limit = settings.backfill_limit;
        builder
    }

    /// Append a tier. Tiers are searched in the order they are added.
    pub fn with_tier<P>(self, tier: P) -> Self
    where
        P: Provider<T, V> + 'static,
    {
        self.with_shared_tier(Arc::new(tier))
    }

    /// Append a tier that is also used elsewhere.
    pub fn with_shared_tier(mut self, tier: SharedProvider<T, V>) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn with_tiers<I>(mut self, tiers: I) -> Self
    where
        I: IntoIterator<Item = SharedProvider<T, V>>,
    {
        self.tiers.extend(tiers);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cap concurrent background backfill writes.
    pub fn with_backfill_limit(mut self, limit: usize) -> Self {
        self.backfill_limit = Some(limit);
        self
    }

    pub fn build(self) -> TieredCache<T, V> {
        TieredCache {
            tiers: self.tiers,
            ttl: self.ttl,
            model_version: self.model_version,
            metrics: self.metrics,
            backfiller: Backfiller::new(self.backfill_limit),
        }
    }
}
