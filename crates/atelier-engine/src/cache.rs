//! Content-addressed node result cache
//!
//! Results are memoized per node id together with a digest of what produced
//! them (node type, configuration and resolved inputs). A lookup only hits
//! when the digest still matches, so any upstream or config change forces a
//! re-execution.
//!
//! The store is persisted as zstd-compressed JSON: an ordered list of
//! `[nodeId, entry]` pairs, oldest write first. Writes go to a temporary file
//! that is renamed over the store, so concurrent writers never leave a torn
//! file (the last rename wins).

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::defaults;
use crate::resolver::ResolvedInputs;
use crate::types::{GraphNode, NodeId};
use crate::value::NodeValue;

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Compression error: {0}")]
    Compression(String),
}

type Result<T> = std::result::Result<T, CacheError>;

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Entries older than this are dropped when the store is loaded
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum number of entries kept (most recent writes win)
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Directory holding the persisted store; `None` keeps the cache in memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    defaults::CACHE_TTL_SECS
}

fn default_capacity() -> usize {
    defaults::CACHE_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
            dir: None,
        }
    }
}

/// One memoized node result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Digest of the (type, config, inputs) that produced `result`
    pub input_hash: String,
    pub result: NodeValue,
    pub timestamp: DateTime<Utc>,
    /// Kept for diagnostics only
    pub node_type: String,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct CacheState {
    /// Oldest write first
    entries: Vec<(NodeId, CacheEntry)>,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn trim_to(&mut self, capacity: usize) {
        if self.entries.len() > capacity {
            let excess = self.entries.len() - capacity;
            self.entries.drain(..excess);
        }
    }
}

#[derive(Serialize)]
struct HashPayload<'a> {
    #[serde(rename = "type")]
    node_type: &'a str,
    config: &'a serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inputs: Option<&'a ResolvedInputs>,
}

/// Digest of a node's type, configuration and resolved inputs
///
/// Hex-encoded blake3 over canonical JSON (object keys sorted). If the
/// inputs cannot be encoded the digest covers type and config only.
pub fn hash_inputs(node: &GraphNode, inputs: &ResolvedInputs) -> String {
    let full = HashPayload {
        node_type: &node.node_type,
        config: &node.config,
        inputs: Some(inputs),
    };

    let bytes = match serde_json::to_vec(&full) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!(
                "Could not encode inputs of '{}' for hashing ({}); hashing config only",
                node.id,
                e
            );
            let fallback = HashPayload {
                inputs: None,
                ..full
            };
            serde_json::to_vec(&fallback).unwrap_or_else(|_| node.node_type.as_bytes().to_vec())
        }
    };

    blake3::hash(&bytes).to_hex().to_string()
}

/// Persistent memo of node results
pub struct ResultCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl ResultCache {
    /// Create an empty cache; call [`ResultCache::init`] to load the store
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Location of the persisted store, if persistence is configured
    pub fn store_path(&self) -> Option<PathBuf> {
        self.config
            .dir
            .as_ref()
            .map(|dir| dir.join(defaults::CACHE_FILE))
    }

    /// Load the persisted store, dropping entries older than the TTL
    ///
    /// A missing store loads empty. A store that cannot be decoded is
    /// logged and also loads empty. Returns the number of entries kept.
    pub fn init(&self) -> Result<usize> {
        let Some(path) = self.store_path() else {
            return Ok(0);
        };

        let loaded = match read_store(&path) {
            Ok(Some(entries)) => entries,
            Ok(None) => Vec::new(),
            Err(CacheError::Io(e)) => return Err(CacheError::Io(e)),
            Err(e) => {
                log::warn!("Ignoring unreadable cache store {:?}: {}", path, e);
                Vec::new()
            }
        };

        let total = loaded.len();
        let ttl = i64::try_from(self.config.ttl_secs).unwrap_or(i64::MAX);
        let now = Utc::now();

        let mut state = self.state.lock();
        state.entries = loaded
            .into_iter()
            .filter(|(_, entry)| (now - entry.timestamp).num_seconds() <= ttl)
            .collect();
        state.trim_to(self.config.capacity);

        let kept = state.entries.len();
        log::info!(
            "Loaded {} cached result(s) from {:?} ({} expired)",
            kept,
            path,
            total - kept
        );
        Ok(kept)
    }

    /// Cached result for `node_id`, only if it was produced from `input_hash`
    pub fn get(&self, node_id: &str, input_hash: &str) -> Option<NodeValue> {
        let mut state = self.state.lock();
        let found = state
            .entries
            .iter()
            .find(|(id, entry)| id == node_id && entry.input_hash == input_hash)
            .map(|(_, entry)| entry.result.clone());

        match found {
            Some(_) => state.hits += 1,
            None => state.misses += 1,
        }
        found
    }

    /// Store a result, evict beyond capacity, then persist
    pub fn set(
        &self,
        node_id: &str,
        input_hash: &str,
        result: NodeValue,
        node_type: &str,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.entries.retain(|(id, _)| id != node_id);
            state.entries.push((
                node_id.to_string(),
                CacheEntry {
                    input_hash: input_hash.to_string(),
                    result,
                    timestamp: Utc::now(),
                    node_type: node_type.to_string(),
                },
            ));
            state.trim_to(self.config.capacity);
        }
        self.flush()
    }

    /// Drop the entry for one node
    pub fn invalidate(&self, node_id: &str) -> Result<bool> {
        let removed = {
            let mut state = self.state.lock();
            let before = state.entries.len();
            state.entries.retain(|(id, _)| id != node_id);
            state.entries.len() != before
        };
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<()> {
        self.state.lock().entries.clear();
        self.flush()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }

    /// Persist the current entries
    pub fn flush(&self) -> Result<()> {
        let Some(path) = self.store_path() else {
            return Ok(());
        };

        let json = serde_json::to_vec(&self.state.lock().entries)?;
        let compressed = zstd::encode_all(&json[..], defaults::CACHE_COMPRESSION_LEVEL)
            .map_err(|e| CacheError::Compression(e.to_string()))?;

        write_atomic(&path, &compressed)
    }
}

fn read_store(path: &Path) -> Result<Option<Vec<(NodeId, CacheEntry)>>> {
    let compressed = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let json =
        zstd::decode_all(&compressed[..]).map_err(|e| CacheError::Compression(e.to_string()))?;
    Ok(Some(serde_json::from_slice(&json)?))
}

/// Write via a sibling temp file and rename over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
