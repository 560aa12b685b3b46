use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{GenerationConfig, OllamaConfig};

/// Sampling options sent in the `options` object of `/api/generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub num_predict: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            num_predict: config.num_predict,
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
        }
    }
}

/// The active model and how it is queried.
///
/// Immutable; switching models means building a new descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub model: String,
    pub timeout: Duration,
    pub options: GenerationOptions,
}

impl ModelDescriptor {
    /// Create a descriptor from the service and generation configuration
    pub fn new(ollama: &OllamaConfig, generation: &GenerationConfig) -> Self {
        Self {
            model: ollama.model.clone(),
            timeout: Duration::from_millis(ollama.timeout_ms),
            options: GenerationOptions::from(generation),
        }
    }

    /// Same timeout and sampling options, different model
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    /// Substring match against a listed model name.
    ///
    /// `qwen2.5:0.5b` matches a listed `qwen2.5:0.5b-instruct`. This is a compatibility
    /// policy, not an exact match.
    pub fn is_listed_as(&self, listed_name: &str) -> bool {
        listed_name.contains(&self.model)
    }

    /// Build a generation request for the given prompt
    pub fn request(&self, prompt: impl Into<String>) -> InferenceRequest {
        InferenceRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            options: self.options.clone(),
            timeout: self.timeout,
        }
    }
}

/// A single generation request, independent of the wire format
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerationOptions,
    pub timeout: Duration,
}

impl InferenceRequest {
    /// Override the sampling budget (used by the verification probe)
    pub fn with_budget(mut self, num_predict: u32, temperature: f32) -> Self {
        self.options.num_predict = num_predict;
        self.options.temperature = temperature;
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Successful, non-empty generation
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Trimmed generated text, never empty
    pub text: String,
    pub duration_secs: f64,
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    pub options: &'a GenerationOptions,
}

impl<'a> From<&'a InferenceRequest> for GenerateRequest<'a> {
    fn from(request: &'a InferenceRequest) -> Self {
        Self {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: &request.options,
        }
    }
}

/// Body of a successful `/api/generate` response
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    /// Nanoseconds
    #[serde(default)]
    pub total_duration: u64,
}

impl GenerateResponse {
    /// Total duration converted to seconds
    pub fn duration_secs(&self) -> f64 {
        self.total_duration as f64 / 1e9
    }
}

/// Body of `GET /api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    pub models: Vec<ModelTag>,
}

/// One entry of the model listing
#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    #[serde(default)]
    pub name: String,
}

impl TagsResponse {
    /// Listed model names
    pub fn names(self) -> Vec<String> {
        self.models.into_iter().map(|m| m.name).collect()
    }
}
