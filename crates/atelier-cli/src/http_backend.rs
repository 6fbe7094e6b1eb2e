//! HTTP generation backend
//!
//! Talks to a generation service that exposes one JSON endpoint per
//! operation under a common base URL.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use atelier_engine::{BackendError, GenerateRequest, GenerationBackend, ImageAnalysis};

/// Generation backend over HTTP
pub struct HttpBackend {
    /// HTTP client for API requests
    http_client: reqwest::Client,
    /// Base URL of the generation service
    base_url: String,
    /// Optional bearer token
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint_url(endpoint);
        log::debug!("POST {}", url);

        let mut request = self.http_client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::new(format!("{}: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::new(format!(
                "{} returned {}: {}",
                endpoint, status, body
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("{}: {}", endpoint, e)))
    }

    async fn post_for_image<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, BackendError> {
        let response: ImageResponse = self.post(endpoint, body).await?;
        Ok(response.image)
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<String, BackendError> {
        self.post_for_image("generate", &request).await
    }

    async fn analyze(&self, image: &str) -> Result<ImageAnalysis, BackendError> {
        self.post("analyze", &json!({ "image": image })).await
    }

    async fn edit_variation(
        &self,
        image: &str,
        instruction: &str,
        quality: &str,
    ) -> Result<String, BackendError> {
        let body = json!({ "image": image, "instruction": instruction, "quality": quality });
        self.post_for_image("edit", &body).await
    }

    async fn style_transfer(&self, content: &str, style: &str) -> Result<String, BackendError> {
        let body = json!({ "content": content, "style": style });
        self.post_for_image("style-transfer", &body).await
    }

    async fn compose(
        &self,
        images: &[String],
        prompt: Option<&str>,
    ) -> Result<String, BackendError> {
        let body = json!({ "images": images, "prompt": prompt });
        self.post_for_image("compose", &body).await
    }
}
