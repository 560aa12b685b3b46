//! # BizDesk Assistant
//!
//! Question answering over a small business database (customers, products and
//! orders), backed by a local Ollama model with a deterministic fallback.
//!
//! ## Features
//!
//! - **Health tracking**: reachability and model verification of the inference service
//! - **Grounded prompts**: a bounded text context built from live aggregate queries
//! - **Fallback answers**: keyword-routed templates that work without the model
//! - **Entity analyses**: customer profile, order mix and product suggestions
//!
//! ## Architecture
//!
//! ```text
//! caller → QueryOrchestrator → ConnectionMonitor → Ollama (HTTP)
//!                ↓                    ↓
//!     AggregateSnapshot (SQLite)   FallbackResponder
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bizdesk_assistant::{Config, OllamaClient, QueryOrchestrator, SqliteAggregates};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = SqliteAggregates::new(&config.database).await?;
//!     let backend = OllamaClient::new(&config.ollama)?;
//!     let orchestrator = QueryOrchestrator::new(&config, Arc::new(backend), Arc::new(store))?;
//!     if let Ok(result) = orchestrator.answer("Quantos clientes temos?", None).await {
//!         println!("{}", result.answer);
//!     }
//!     Ok(())
//! }
//! ```

/// Command-line interface.
pub mod cli;
/// Configuration loaded from the environment.
pub mod config;
/// Aggregate snapshots and prompt context assembly.
pub mod context;
/// Error types and result aliases for the application.
pub mod error;
/// Deterministic keyword-routed answers.
pub mod fallback;
/// Ollama client and request types.
pub mod inference;
/// Connection and model health tracking.
pub mod monitor;
/// Question routing between inference and fallback.
pub mod orchestrator;
/// Prompt text sent to the model.
pub mod prompts;
/// Read-only aggregate queries over the business store.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use inference::OllamaClient;
pub use orchestrator::{AnswerResult, AnswerSource, QueryOrchestrator, StatusSnapshot};
pub use storage::SqliteAggregates;
