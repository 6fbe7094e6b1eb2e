//! Generation backend abstraction
//!
//! The engine treats image generation as an opaque asynchronous capability.
//! Hosts plug in an implementation (HTTP service, local model, test stub);
//! the executor only sees this trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Generic request failure with a message from the backend
    pub fn new(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }
}

/// Parameters for a single image generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    /// Reference images guiding the generation
    #[serde(default)]
    pub references: Vec<String>,
    pub aspect_ratio: String,
    pub quality: String,
}

/// Result of analyzing an image
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageAnalysis {
    /// Dominant colors as hex strings
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// The external generation capability.
///
/// All calls may suspend for an unbounded time; the executor wraps each one
/// in its configured timeout.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate an image from a prompt
    async fn generate(&self, request: GenerateRequest) -> Result<String, BackendError>;

    /// Extract palette, keywords and a description from an image
    async fn analyze(&self, image: &str) -> Result<ImageAnalysis, BackendError>;

    /// Re-render an image following an instruction
    async fn edit_variation(
        &self,
        image: &str,
        instruction: &str,
        quality: &str,
    ) -> Result<String, BackendError>;

    /// Restyle `content` using `style`
    async fn style_transfer(&self, content: &str, style: &str) -> Result<String, BackendError>;

    /// Merge several images into one, optionally guided by a prompt
    async fn compose(&self, images: &[String], prompt: Option<&str>)
        -> Result<String, BackendError>;
}
