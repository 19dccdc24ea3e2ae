//! HTTP client for the text-generation backend.
//!
//! The backend is an external collaborator reachable at a configurable base
//! URL (an Ollama-style `/api/generate` endpoint). Every call is bounded by
//! the configured timeout; a timeout or connection failure becomes a
//! [`BackendError`] carrying the endpoint, which the synthesizer renders
//! inline instead of raising.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::GenerationConfig;

#[derive(Debug, Error)]
#[error("generation backend at {base_url} failed: {reason}")]
pub struct BackendError {
    pub base_url: String,
    pub reason: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for the generation endpoint, configured once per pipeline.
pub struct GenerationClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GenerationClient {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one non-streaming completion. Timeouts and connection errors
    /// come back as [`BackendError`], never as a panic or hang.
    pub async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let fail = |reason: String| BackendError {
            base_url: self.base_url.clone(),
            reason,
        };

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {}: {}", status, body_text)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| fail(format!("malformed response body: {}", e)))?;
        Ok(parsed.response)
    }
}
