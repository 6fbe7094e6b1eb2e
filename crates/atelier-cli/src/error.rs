use std::path::PathBuf;

use atelier_engine::{CacheError, ConfigError, EngineError};

/// Errors surfaced by the command-line host
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid workflow file {path:?}: {source}")]
    Workflow {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("No generation service configured (set backend.baseUrl in {0:?})")]
    NoBackend(PathBuf),
}
