//! Inference service client.
//!
//! This module provides:
//! - [`InferenceBackend`]: the two operations the orchestrator needs (list models, generate)
//! - [`OllamaClient`]: the reqwest-based implementation of the Ollama wire contract
//! - Request/response types and the active [`ModelDescriptor`]
//!
//! Errors are returned as [`InferenceError`](crate::error::InferenceError) values and
//! never panic; the caller decides whether to fall back.

mod client;
mod types;


pub use client::OllamaClient;
pub use types::*;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{InferenceError, InferenceResult};

/// Operations offered by the inference service.
///
/// Implementations are stateless from the caller's point of view: each call is bounded
/// by its own timeout and may be retried freely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// List the names of the models the service can run.
    async fn list_models(&self, timeout: Duration) -> InferenceResult<Vec<String>>;

    /// Generate a completion. An empty (after trimming) response is an
    /// [`InferenceError::EmptyResponse`], never a success.
    async fn generate(&self, request: &InferenceRequest) -> InferenceResult<Completion>;

    /// Base URL of the service, for status reporting.
    fn base_url(&self) -> String;
}

/// Run an inference future, aborting it when `cancel` fires.
///
/// Dropping the future aborts the underlying HTTP request.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> InferenceResult<T>
where
    F: Future<Output = InferenceResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InferenceError::Cancelled),
        result = fut => result,
    }
}
