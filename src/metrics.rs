//! Prometheus counters for cache activity, labelled by tier name.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub struct CacheMetrics {
    /// Keys resolved by a tier.
    pub hits: IntCounterVec,
    /// Keys a tier reported missing.
    pub misses: IntCounterVec,
    /// Read failures treated as misses.
    pub errors: IntCounterVec,
    /// Keys written back into tiers that missed them.
    pub backfill_writes: IntCounterVec,
    pub backfill_failures: IntCounterVec,
    /// Origin invocations.
    pub source_calls: IntCounter,
    /// Keys requested from the origin.
    pub source_keys: IntCounter,
}

impl CacheMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let tier_counter = |name: &str, help: &str| {
            IntCounterVec::new(Opts::new(name, help).namespace("datasource_cache"), &["tier"])
        };

        Ok(Self {
            hits: tier_counter("tier_hits_total", "Keys resolved by a tier")?,
            misses: tier_counter("tier_misses_total", "Keys missing from a tier")?,
            errors: tier_counter("tier_errors_total", "Tier reads that failed")?,
            backfill_writes: tier_counter("backfill_writes_total", "Keys backfilled into a tier")?,
            backfill_failures: tier_counter(
                "backfill_failures_total",
                "Backfill writes that failed",
            )?,
            source_calls: IntCounter::with_opts(
                Opts::new("source_calls_total", "Origin invocations").namespace("datasource_cache"),
            )?,
            source_keys: IntCounter::with_opts(
                Opts::new("source_keys_total", "Keys requested from the origin")
                    .namespace("datasource_cache"),
            )?,
        })
    }

    /// Create the counters and register them on `registry`.
    pub fn registered(registry: &Registry) -> prometheus::Result<Self> {
        let metrics = Self::new()?;
        registry.register(Box::new(metrics.hits.clone()))?;
        registry.register(Box::new(metrics.misses.clone()))?;
        registry.register(Box::new(metrics.errors.clone()))?;
        registry.register(Box::new(metrics.backfill_writes.clone()))?;
        registry.register(Box::new(metrics.backfill_failures.clone()))?;
        registry.register(Box::new(metrics.source_calls.clone()))?;
        registry.register(Box::new(metrics.source_keys.clone()))?;
        Ok(metrics)
    }

    pub(crate) fn record_lookup(&self, tier: &str, hits: usize, misses: usize) {
        self.hits.with_label_values(&[tier]).inc_by(hits as u64);
        self.misses.with_label_values(&[tier]).inc_by(misses as u64);
    }

    pub(crate) fn record_error(&self, tier: &str) {
        self.errors.with_label_values(&[tier]).inc();
    }

    pub(crate) fn record_source(&self, keys: usize) {
        self.source_calls.inc();
        self.source_keys.inc_by(keys as u64);
    }

    pub(crate) fn record_backfill(&self, tier: &str, keys: usize, ok: bool) {
        if ok {
            self.backfill_writes.with_label_values(&[tier]).inc_by(keys as u64);
        } else {
            self.backfill_failures.with_label_values(&[tier]).inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_record() {
        let registry = Registry::new();
        let metrics = CacheMetrics::registered(&registry).unwrap();

        metrics.record_lookup("memory", 3, 1);
        metrics.record_source(1);
        metrics.record_backfill("memory", 1, true);

        assert_eq!(metrics.hits.with_label_values(&["memory"]).get(), 3);
        assert_eq!(metrics.misses.with_label_values(&["memory"]).get(), 1);
        assert_eq!(metrics.source_calls.get(), 1);
        let text = prometheus::TextEncoder::new()
            .encode_to_string(&registry.gather())
            .unwrap();
        assert!(text.contains("datasource_cache_tier_hits_total{tier=\"memory\"} 3"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        CacheMetrics::registered(&registry).unwrap();
        assert!(CacheMetrics::registered(&registry).is_err());
    }
}
