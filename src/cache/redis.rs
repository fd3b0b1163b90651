//! Distributed-store tier backed by Redis.
//!
//! Values are MessagePack-encoded. Batch reads are split into fixed-size chunks
//! that are fetched concurrently and merged once every chunk has finished, so a
//! single MGET round-trip never carries more than `chunk_size` keys.
//!
//! Batch classification:
//! - absent slot → missing
//! - undecodable slot → missing (logged; a corrupt entry degrades to a miss)
//! - version mismatch → missing (left in place until it expires or is overwritten)
//! - chunk transport failure → every key of that chunk is missing
//!
//! Missing keys always propagate to the next tier or the origin; nothing is dropped.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::codec;
use crate::cache::error::CacheError;
use crate::cache::key::{Entity, Key};
use crate::cache::provider::{Provider, TierLookup};

/// Default number of keys per MGET round-trip.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Network operations the Redis tier needs from its client.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait KvTransport: Send + Sync {
    /// Fetch one key; `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Fetch many keys in one round-trip, one slot per requested key, in order.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError>;

    /// Store every item with `ttl` as a single atomic unit.
    async fn set_many_with_expiry(
        &self,
        items: Vec<(String, Vec<u8>)>,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

#[async_trait]
impl KvTransport for ConnectionManager {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        let mut conn = self.clone();
        let values: Vec<Option<Vec<u8>>> = mget_command(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn set_many_with_expiry(
        &self,
        items: Vec<(String, Vec<u8>)>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.clone();
        let _: () = write_pipeline(items, ttl).query_async(&mut conn).await?;
        Ok(())
    }
}

/// Explicit MGET: a one-element `get` would be sent as GET and not return a list.
fn mget_command(keys: &[String]) -> redis::Cmd {
    let mut cmd = redis::cmd("MGET");
    cmd.arg(keys);
    cmd
}

/// MULTI, one PSETEX per item, EXEC: no key is ever visible without its expiry.
fn write_pipeline(items: Vec<(String, Vec<u8>)>, ttl: Duration) -> redis::Pipeline {
    let millis = expiry_millis(ttl);

    let mut pipe = redis::pipe();
    pipe.atomic();
    for (key, value) in items {
        pipe.pset_ex(key, value, millis).ignore();
    }
    pipe
}

/// PSETEX rejects 0, so a zero TTL becomes 1 ms. Oversized TTLs saturate.
fn expiry_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Connect a pooled, auto-reconnecting client.
pub async fn connect(url: &str) -> Result<ConnectionManager, CacheError> {
    let client = redis::Client::open(url)?;
    Ok(client.get_connection_manager().await?)
}

pub struct RedisTier<T, C = ConnectionManager> {
    transport: Arc<C>,
    chunk_size: usize,
    name: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T, C> RedisTier<T, C>
where
    T: Entity + Serialize + DeserializeOwned,
    C: KvTransport,
{
    pub fn new(transport: C) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    /// Build on a transport shared with other tiers or callers.
    pub fn from_shared(transport: Arc<C>) -> Self {
        Self {
            transport,
            chunk_size: DEFAULT_CHUNK_SIZE,
            name: "redis".to_string(),
            _entity: PhantomData,
        }
    }

    /// Keys per MGET round-trip; values below 1 are clamped to 1.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fetch and classify one chunk. Never fails: transport errors turn the
    /// whole chunk into misses.
    async fn fetch_chunk<V: Clone>(
        &self,
        chunk: &[Key<V>],
        required_version: u16,
    ) -> TierLookup<T, V> {
        let mut lookup = TierLookup::new();
        let raw_keys: Vec<String> = chunk.iter().map(|k| k.cache_key.clone()).collect();

        let slots = match self.transport.mget(&raw_keys).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!(tier = %self.name, keys = chunk.len(), "Chunk fetch failed: {e}");
                lookup.missing.extend(chunk.iter().cloned());
                return lookup;
            }
        };

        if slots.len() != chunk.len() {
            warn!(
                tier = %self.name,
                expected = chunk.len(),
                got = slots.len(),
                "MGET returned wrong number of slots"
            );
        }

        for (i, key) in chunk.iter().enumerate() {
            let Some(Some(bytes)) = slots.get(i) else {
                lookup.missing.push(key.clone());
                continue;
            };

            let item: T = match codec::decode(bytes) {
                Ok(item) => item,
                Err(e) => {
                    warn!(tier = %self.name, key = %key, "Undecodable cache entry: {e}");
                    lookup.missing.push(key.clone());
                    continue;
                }
            };

            if item.model_version() != required_version {
                lookup.missing.push(key.clone());
                continue;
            }

            lookup.found.insert(key.clone(), Arc::new(item));
        }

        lookup
    }
}

#[async_trait]
impl<T, V, C> Provider<T, V> for RedisTier<T, C>
where
    T: Entity + Serialize + DeserializeOwned,
    V: Clone + Send + Sync + 'static,
    C: KvTransport,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &Key<V>, required_version: u16) -> Result<Option<Arc<T>>, CacheError> {
        let Some(bytes) = self.transport.get(key.as_str()).await? else {
            return Ok(None);
        };

        let item: T = codec::decode(&bytes)?;
        if item.model_version() != required_version {
            return Ok(None);
        }

        Ok(Some(Arc::new(item)))
    }

    async fn mget(
        &self,
        keys: &[Key<V>],
        required_version: u16,
    ) -> Result<TierLookup<T, V>, CacheError> {
        if keys.is_empty() {
            return Ok(TierLookup::new());
        }

        let units = keys
            .chunks(self.chunk_size)
            .map(|chunk| self.fetch_chunk(chunk, required_version));

        let mut lookup = TierLookup::new();
        for partial in join_all(units).await {
            lookup.merge(partial);
        }

        debug!(
            tier = %self.name,
            requested = keys.len(),
            found = lookup.found.len(),
            missing = lookup.missing.len(),
            "Batch lookup complete"
        );

        Ok(lookup)
    }

    async fn mset(&self, values: &HashMap<String, Arc<T>>, ttl: Duration) -> Result<(), CacheError> {
        let mut items = Vec::with_capacity(values.len());

        for (key, value) in values {
            match codec::encode(value.as_ref()) {
                Ok(bytes) => items.push((key.clone(), bytes)),
                Err(e) => warn!(tier = %self.name, key = %key, "Skipping unencodable value: {e}"),
            }
        }

        if items.is_empty() {
            return Ok(());
        }

        let count = items.len();
        self.transport.set_many_with_expiry(items, ttl).await?;

        debug!(tier = %self.name, count, ttl_ms = ttl.as_millis() as u64, "Stored values");
        Ok(())
    }
}
