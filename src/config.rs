//! Runtime configuration for datasource-cache.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Tier selection and sizing, the default TTL and the model version live here.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::cache::memory::{DEFAULT_MEMORY_CAPACITY, DEFAULT_MEMORY_TTL};
use crate::cache::redis::DEFAULT_CHUNK_SIZE;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "datasource-cache", about = "Multi-tier read-through cache demo")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Redis URL; overrides `redis.url` from the config file.
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Number of demo entities to look up.
    #[arg(long, default_value_t = 250)]
    pub entities: usize,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Orchestrator settings.
    pub cache: CacheSettings,

    /// In-process tier.
    pub memory: MemoryTierConfig,

    /// Redis tier.
    pub redis: RedisTierConfig,
}

/// Settings applied by the orchestrator to every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Model version required of every cached value.
    pub model_version: u16,

    /// TTL for writes issued by the orchestrator, in seconds.
    pub default_ttl_secs: u64,

    /// Maximum concurrent background backfill writes (None = unbounded).
    pub backfill_limit: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            model_version: 1,
            default_ttl_secs: 5 * 60,
            backfill_limit: None,
        }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Bounded in-process tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTierConfig {
    pub enabled: bool,

    /// Maximum number of entries.
    pub capacity: u64,

    /// Global entry TTL in seconds; per-call TTLs are ignored by this tier.
    pub ttl_secs: u64,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_MEMORY_CAPACITY,
            ttl_secs: DEFAULT_MEMORY_TTL.as_secs(),
        }
    }
}

/// Redis tier. Disabled when no URL is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisTierConfig {
    /// e.g. "redis://127.0.0.1:6379".
    pub url: Option<String>,

    /// Keys per MGET round-trip.
    pub chunk_size: usize,
}

impl Default for RedisTierConfig {
    fn default() -> Self {
        Self {
            url: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line overrides.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(url) = &cli.redis_url {
            self.redis.url = Some(url.clone());
        }
        self
    }
}
