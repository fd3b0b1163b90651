//! Multi-tier read-through cache.
//!
//! This module contains the cache contracts, tiers and the orchestrator:
//! - [`key`]: Key and Entity definitions
//! - [`provider`]: the Provider trait every tier implements
//! - [`source`]: origin collaborators consulted on a full miss
//! - [`memory`]: bounded in-process tier (moka)
//! - [`redis`]: distributed-store tier with chunked concurrent batch reads
//! - [`codec`]: MessagePack encoding for byte-oriented tiers
//! - [`tiered`]: the orchestrator (get / mget / mset with backfill)
//! - [`builder`]: static configuration of the orchestrator
//! - [`backfill`]: owned background writes with a drain hook

pub mod backfill;
pub mod builder;
pub mod codec;
pub mod error;
pub mod key;
pub mod memory;
pub mod provider;
pub mod redis;
pub mod source;
pub mod tiered;
