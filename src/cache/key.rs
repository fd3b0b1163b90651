//! Cache keys and the entity capability.
//!
//! A [`Key`] pairs the storage lookup string with an opaque value forwarded to
//! the origin. Keys compare and hash on `cache_key` alone, so two instances
//! naming the same entry are interchangeable in every map the cache builds.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Anything stored in a tier carries a model version for soft invalidation.
///
/// A stored value whose version differs from the version the cache was built
/// with is treated as absent. It is left in place and overwritten or expired later.
pub trait Entity: Send + Sync + 'static {
    fn model_version(&self) -> u16;
}

/// A logical cache entry.
#[derive(Clone)]
pub struct Key<V> {
    /// Lookup string used by every storage tier.
    pub cache_key: String,

    /// Context handed unchanged to the origin (e.g. the raw id before prefixing).
    pub original_value: V,
}

impl<V> Key<V> {
    pub fn new(cache_key: impl Into<String>, original_value: V) -> Self {
        Self {
            cache_key: cache_key.into(),
            original_value,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.cache_key
    }
}

impl<V> PartialEq for Key<V> {
    fn eq(&self, other: &Self) -> bool {
        self.cache_key == other.cache_key
    }
}

impl<V> Eq for Key<V> {}

// Must hash exactly like `str` so `Borrow<str>` lookups agree.
impl<V> Hash for Key<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cache_key.as_str().hash(state);
    }
}

impl<V> Borrow<str> for Key<V> {
    fn borrow(&self) -> &str {
        &self.cache_key
    }
}

impl<V: fmt::Debug> fmt::Debug for Key<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("cache_key", &self.cache_key)
            .field("original_value", &self.original_value)
            .finish()
    }
}

impl<V> fmt::Display for Key<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key)
    }
}
