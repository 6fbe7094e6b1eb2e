//! Engine configuration
//!
//! Serde-backed settings for the cache, the generation backend and batch
//! nodes. Every field has a default, so a partial (or missing) file works.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::cache::CacheConfig;

/// Single source of truth for engine defaults
pub mod defaults {
    /// Cache entries older than this are dropped at load (one day)
    pub const CACHE_TTL_SECS: u64 = 86_400;
    /// Maximum number of cached node results
    pub const CACHE_CAPACITY: usize = 100;
    /// File name of the persisted cache inside the cache directory
    pub const CACHE_FILE: &str = "atelier-node-cache.json.zst";
    /// Compression level for the persisted cache
    pub const CACHE_COMPRESSION_LEVEL: i32 = 3;

    /// Upper bound for a single backend call
    pub const BACKEND_TIMEOUT_SECS: u64 = 120;
    /// Concurrent generations per batch chunk
    pub const PARALLEL_LIMIT: usize = 3;

    pub const ASPECT_RATIO: &str = "1:1";
    pub const QUALITY: &str = "standard";
    pub const UPSCALE_TARGET_SIZE: &str = "2048x2048";
    pub const UPSCALE_QUALITY: &str = "high";
}

/// Generation backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Timeout for each backend call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL of the generation service
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token for the generation service
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_timeout_secs() -> u64 {
    defaults::BACKEND_TIMEOUT_SECS
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Batch node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    /// Chunk size for batch nodes that do not set their own
    #[serde(default = "default_parallel_limit")]
    pub parallel_limit: usize,
}

fn default_parallel_limit() -> usize {
    defaults::PARALLEL_LIMIT
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel_limit: default_parallel_limit(),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl EngineConfig {
    /// Load configuration from a JSON file; a missing file yields defaults
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !fs::try_exists(path).await? {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration as pretty JSON, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, contents).await?;

        log::info!("Configuration saved to {:?}", path);
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}
