//! Error types for tier and orchestrator operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to encode cached value: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode cached value: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The origin was needed but the supplied source does not implement the lookup.
    #[error("Get from source is not defined")]
    SourceUndefined,

    #[error("Can not get from source: {0}")]
    Source(#[source] anyhow::Error),

    #[error("Write to tier {tier} failed: {source}")]
    TierWrite {
        tier: String,
        #[source]
        source: Box<CacheError>,
    },

    /// One entry per tier that failed during a fan-out write.
    #[error("{} tier write(s) failed", .0.len())]
    Partial(Vec<CacheError>),
}

impl CacheError {
    /// Wrap a tier failure with the tier's name.
    pub fn tier_write(tier: impl Into<String>, source: CacheError) -> Self {
        CacheError::TierWrite {
            tier: tier.into(),
            source: Box::new(source),
        }
    }

    /// Tier-level errors carried by an aggregated write failure.
    pub fn failures(&self) -> &[CacheError] {
        match self {
            CacheError::Partial(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }
}

/// Failure reported by an origin [`DataSource`](crate::cache::source::DataSource).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source does not support {0} lookups")]
    Unsupported(&'static str),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<SourceError> for CacheError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unsupported(_) => CacheError::SourceUndefined,
            SourceError::Failed(e) => CacheError::Source(e),
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
