use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{Completion, GenerateRequest, GenerateResponse, InferenceRequest, TagsResponse};
use super::InferenceBackend;
use crate::config::OllamaConfig;
use crate::error::{AppError, AppResult, InferenceError, InferenceResult};

/// Pool idle timeout for the shared HTTP client
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// TCP keep-alive interval for the shared HTTP client
const TCP_KEEPALIVE_SECS: u64 = 60;

/// Client for the Ollama HTTP API.
///
/// Stateless: every call carries its own timeout and the client only knows the
/// two endpoints the orchestrator needs.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a new Ollama client. Fails fast on an invalid base URL.
    pub fn new(config: &OllamaConfig) -> AppResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE_SECS))
            .build()
            .map_err(|e| AppError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Extract the error detail of a non-2xx response: the JSON `error` field when
    /// present, the raw body otherwise.
    fn error_detail(body: String) -> String {
        serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body)
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn list_models(&self, timeout: Duration) -> InferenceResult<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let timeout_ms = timeout.as_millis() as u64;

        debug!(url = %url, timeout_ms, "Listing Ollama models");

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(e, timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Protocol {
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status.as_u16(), Self::error_detail(body)),
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::from_reqwest(e, timeout_ms))?;

        Ok(tags.names())
    }

    async fn generate(&self, request: &InferenceRequest) -> InferenceResult<Completion> {
        let url = format!("{}/api/generate", self.base_url);
        let timeout_ms = request.timeout.as_millis() as u64;
        let start = Instant::now();

        debug!(
            model = %request.model,
            prompt_chars = request.prompt.chars().count(),
            num_predict = request.options.num_predict,
            timeout_ms,
            "Calling Ollama generate"
        );

        let response = self
            .client
            .post(&url)
            .timeout(request.timeout)
            .json(&GenerateRequest::from(request))
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(e, timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = Self::error_detail(body);
            warn!(
                model = %request.model,
                status = status.as_u16(),
                detail = %detail,
                "Ollama generate returned an error status"
            );
            return Err(InferenceError::Protocol {
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status.as_u16(), detail),
            });
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::from_reqwest(e, timeout_ms))?;

        let text = generated.response.trim();
        if text.is_empty() {
            return Err(InferenceError::EmptyResponse);
        }

        info!(
            model = %request.model,
            chars = text.chars().count(),
            duration_secs = generated.duration_secs(),
            latency_ms = start.elapsed().as_millis(),
            "Ollama generate succeeded"
        );

        Ok(Completion {
            text: text.to_string(),
            duration_secs: generated.duration_secs(),
        })
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }
}
