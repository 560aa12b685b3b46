use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Inference service errors.
///
/// Every variant is recoverable at the orchestrator level. All of them lead to the
/// fallback path except [`InferenceError::Cancelled`], which aborts the call.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference service unreachable: {message}")]
    Network { message: String },

    #[error("Inference service timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Protocol error: {message}")]
    Protocol { status: Option<u16>, message: String },

    #[error("Model {model} is not listed by the inference service")]
    ModelNotListed { model: String, available: Vec<String> },

    #[error("empty response")]
    EmptyResponse,

    #[error("Request cancelled")]
    Cancelled,
}

/// Classification of [`InferenceError`] used for routing and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkUnreachable,
    Timeout,
    ProtocolError,
    ModelNotListed,
    EmptyResponse,
    Cancelled,
}

impl ErrorKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkUnreachable => "network_unreachable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::ModelNotListed => "model_not_listed",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Transport-level failures: the service itself misbehaved or could not be reached.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkUnreachable | ErrorKind::Timeout | ErrorKind::ProtocolError
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl InferenceError {
    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InferenceError::Network { .. } => ErrorKind::NetworkUnreachable,
            InferenceError::Timeout { .. } => ErrorKind::Timeout,
            InferenceError::Protocol { .. } => ErrorKind::ProtocolError,
            InferenceError::ModelNotListed { .. } => ErrorKind::ModelNotListed,
            InferenceError::EmptyResponse => ErrorKind::EmptyResponse,
            InferenceError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Classify a transport error from reqwest.
    pub fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout { timeout_ms }
        } else if err.is_decode() {
            InferenceError::Protocol {
                status: err.status().map(|s| s.as_u16()),
                message: format!("Failed to parse response: {}", err),
            }
        } else {
            InferenceError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for inference operations
pub type InferenceResult<T> = Result<T, InferenceError>;
