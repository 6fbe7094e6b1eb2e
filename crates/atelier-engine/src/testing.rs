//! Stub backend shared by the engine's unit tests

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{BackendError, GenerateRequest, GenerationBackend, ImageAnalysis};

/// Deterministic backend: generate echoes the prompt uppercased
#[derive(Default)]
pub struct StubBackend {
    log: Mutex<Vec<String>>,
    fail_with: Option<String>,
    delay: Option<Duration>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Every call sleeps for `delay` first
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Call log, e.g. `["start:a", "end:a", "analyze"]`
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Number of completed backend calls of any kind
    pub fn call_count(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|entry| !entry.starts_with("start:"))
            .count()
    }

    async fn enter(&self, entry: String) -> Result<(), BackendError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(BackendError::new(message.clone()));
        }
        self.log.lock().push(entry);
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<String, BackendError> {
        if self.fail_with.is_none() && self.delay.is_none() {
            self.log.lock().push(format!("start:{}", request.prompt));
            tokio::task::yield_now().await;
        }
        self.enter(format!("end:{}", request.prompt)).await?;
        Ok(request.prompt.to_uppercase())
    }

    async fn analyze(&self, image: &str) -> Result<ImageAnalysis, BackendError> {
        self.enter("analyze".to_string()).await?;
        Ok(ImageAnalysis {
            colors: vec!["#112233".to_string()],
            keywords: vec!["calm".to_string(), "sea".to_string()],
            description: format!("a picture of {}", image),
        })
    }

    async fn edit_variation(
        &self,
        image: &str,
        instruction: &str,
        quality: &str,
    ) -> Result<String, BackendError> {
        self.enter(format!("edit:{}", instruction)).await?;
        Ok(format!("edited({},{})", image, quality))
    }

    async fn style_transfer(&self, content: &str, style: &str) -> Result<String, BackendError> {
        self.enter("style".to_string()).await?;
        Ok(format!("styled({},{})", content, style))
    }

    async fn compose(
        &self,
        images: &[String],
        prompt: Option<&str>,
    ) -> Result<String, BackendError> {
        self.enter("compose".to_string()).await?;
        Ok(format!("composed({};{})", images.join(","), prompt.unwrap_or("")))
    }
}
