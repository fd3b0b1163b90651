//! Origin collaborators consulted when every tier misses.
//!
//! A source is idempotent and may be asked for any subset of keys. Keys it
//! cannot find are simply left out of its result, which is not an error.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;

use crate::cache::error::SourceError;
use crate::cache::key::Key;

/// The authoritative data origin.
///
/// Both lookups default to [`SourceError::Unsupported`], which the cache reports
/// as a configuration error when it actually needs that lookup.
#[async_trait]
pub trait DataSource<T, V>: Send + Sync
where
    T: Send + 'static,
    V: Send + Sync + 'static,
{
    async fn get_one(&self, key: &Key<V>) -> Result<Option<T>, SourceError> {
        let _ = key;
        Err(SourceError::Unsupported("single-key"))
    }

    async fn get_many(&self, keys: &[Key<V>]) -> Result<HashMap<Key<V>, T>, SourceError> {
        let _ = keys;
        Err(SourceError::Unsupported("batch"))
    }
}

/// A source that supports nothing; any fallthrough fails with `SourceUndefined`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSource;

impl<T, V> DataSource<T, V> for NoSource
where
    T: Send + 'static,
    V: Send + Sync + 'static,
{
}

/// Single-key source backed by a closure. See [`single_source`].
pub struct SingleFn<F>(F);

/// Batch source backed by a closure. See [`batch_source`].
pub struct BatchFn<F>(F);

/// Adapt `Fn(Key<V>) -> Future<Output = anyhow::Result<Option<T>>>` into a source.
pub fn single_source<F>(f: F) -> SingleFn<F> {
    SingleFn(f)
}

/// Adapt `Fn(Vec<Key<V>>) -> Future<Output = anyhow::Result<HashMap<Key<V>, T>>>` into a source.
pub fn batch_source<F>(f: F) -> BatchFn<F> {
    BatchFn(f)
}

#[async_trait]
impl<T, V, F, Fut> DataSource<T, V> for SingleFn<F>
where
    T: Send + 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(Key<V>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
{
    async fn get_one(&self, key: &Key<V>) -> Result<Option<T>, SourceError> {
        Ok((self.0)(key.clone()).await?)
    }
}

#[async_trait]
impl<T, V, F, Fut> DataSource<T, V> for BatchFn<F>
where
    T: Send + 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(Vec<Key<V>>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<HashMap<Key<V>, T>>> + Send,
{
    async fn get_many(&self, keys: &[Key<V>]) -> Result<HashMap<Key<V>, T>, SourceError> {
        Ok((self.0)(keys.to_vec()).await?)
    }
}
