use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

/// Concurrent outbound completion calls across all requests.
const MAX_CONCURRENT_COMPLETIONS: usize = 5;

#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("completion engine unreachable: {0}")]
    Unreachable(String),
    #[error("completion engine error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
}

/// Text in, text out. The engine guarantees nothing about the structure of
/// its output; all validation happens in the suggestion generator. Calls
/// may block for the full duration of model inference.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, EngineError>;
}

/// Ollama-backed completion engine.
///
/// A semaphore caps in-flight generations so a slow model cannot
/// monopolize the service's outbound capacity.
pub struct OllamaEngine {
    http: reqwest::Client,
    base_url: String,
    model: String,
    permits: Arc<Semaphore>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaEngine {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_COMPLETIONS)),
        }
    }
}

#[async_trait]
impl CompletionEngine for OllamaEngine {
    async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
        // Closed only on drop of self, so acquire cannot fail in practice
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;

        debug!(prompt_len = prompt.len(), model = %self.model, "requesting completion");

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "options": { "temperature": 0.3 },
            }))
            .send()
            .await
            .map_err(|e| EngineError::Unreachable(format!("{}: {e}", self.base_url)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Api { status, body });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Api {
                status,
                body: format!("malformed engine response: {e}"),
            })?;

        debug!(response_len = body.response.len(), "completion received");
        Ok(body.response)
    }
}
