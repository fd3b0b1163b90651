//! datasource-cache: multi-tier read-through cache.
//!
//! An ordered chain of tiers (in-process LRU, Redis, ...) sits in front of an
//! authoritative origin:
//!   memory (hot) → Redis (shared) → origin (authoritative)
//!
//! Lookups narrow tier by tier to the keys still missing, fall through to the
//! origin once, and write what the origin returned back into the tiers that
//! missed it.

pub mod cache;
pub mod config;
pub mod metrics;

pub use cache::builder::CacheBuilder;
pub use cache::error::{CacheError, CacheResult, SourceError};
pub use cache::key::{Entity, Key};
pub use cache::memory::MemoryTier;
pub use cache::provider::{Provider, TierLookup};
pub use cache::redis::{KvTransport, RedisTier};
pub use cache::source::{batch_source, single_source, DataSource, NoSource};
pub use cache::tiered::TieredCache;
