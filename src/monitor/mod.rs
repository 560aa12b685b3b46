//! Connection health tracking for the inference service.
//!
//! Tracks two distinct conditions: whether the service is reachable and lists the
//! configured model, and whether that model actually answers.
//!
//! # States
//!
//! - **Unknown**: nothing checked since startup or since the last model switch
//! - **Unreachable**: the model listing failed
//! - **ReachableModelMissing**: the service answered but does not list the model
//! - **ReachableModelUnverified**: listed, not yet proven to generate text
//! - **Operational**: listed and verified
//! - **Degraded**: listed, but the verification prompt failed

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::OllamaConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::inference::{cancellable, InferenceBackend, ModelDescriptor};
use crate::prompts::PROBE_PROMPT;

/// Token budget of the verification prompt
const PROBE_NUM_PREDICT: u32 = 5;

/// Temperature of the verification prompt
const PROBE_TEMPERATURE: f32 = 0.1;

/// Health of the inference service as seen by the last completed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionState {
    Unknown,
    Unreachable,
    ReachableModelMissing,
    ReachableModelUnverified,
    Operational,
    Degraded(String),
}

impl ConnectionState {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Unknown => "unknown",
            ConnectionState::Unreachable => "unreachable",
            ConnectionState::ReachableModelMissing => "reachable_model_missing",
            ConnectionState::ReachableModelUnverified => "reachable_model_unverified",
            ConnectionState::Operational => "operational",
            ConnectionState::Degraded(_) => "degraded",
        }
    }

    /// The service answered its last reachability check.
    pub fn is_reachable(&self) -> bool {
        matches!(
            self,
            ConnectionState::ReachableModelMissing
                | ConnectionState::ReachableModelUnverified
                | ConnectionState::Operational
                | ConnectionState::Degraded(_)
        )
    }

    /// The configured model is listed (verified or not).
    pub fn is_model_listed(&self) -> bool {
        matches!(
            self,
            ConnectionState::ReachableModelUnverified
                | ConnectionState::Operational
                | ConnectionState::Degraded(_)
        )
    }

    pub fn is_operational(&self) -> bool {
        matches!(self, ConnectionState::Operational)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Degraded(reason) => write!(f, "degraded ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// State plus the descriptor it was computed for, swapped as one value.
#[derive(Debug, Clone)]
struct MonitorInner {
    state: ConnectionState,
    descriptor: Arc<ModelDescriptor>,
    /// Bumped on every descriptor replacement so in-flight checks for the old
    /// descriptor cannot overwrite the reset state.
    generation: u64,
}

/// Tracks reachability and model health of the inference service.
///
/// Never panics or propagates transport failures as faults: every check returns a
/// `Result` whose error carries the human-readable reason. Cancelled checks leave
/// the state untouched.
pub struct ConnectionMonitor {
    backend: Arc<dyn InferenceBackend>,
    inner: RwLock<MonitorInner>,
    reachability_timeout: Duration,
    probe_timeout: Duration,
}

impl ConnectionMonitor {
    /// Create a new monitor in the `Unknown` state
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        descriptor: ModelDescriptor,
        config: &OllamaConfig,
    ) -> Self {
        Self {
            backend,
            inner: RwLock::new(MonitorInner {
                state: ConnectionState::Unknown,
                descriptor: Arc::new(descriptor),
                generation: 0,
            }),
            reachability_timeout: Duration::from_millis(config.reachability_timeout_ms),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }

    /// Current state (a fully formed clone, never a partial update)
    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state.clone()
    }

    /// Active model descriptor
    pub async fn descriptor(&self) -> Arc<ModelDescriptor> {
        self.inner.read().await.descriptor.clone()
    }

    /// Replace the active descriptor, resetting the state to `Unknown`.
    pub async fn replace_descriptor(&self, descriptor: ModelDescriptor) {
        let mut inner = self.inner.write().await;
        info!(
            previous = %inner.descriptor.model,
            model = %descriptor.model,
            "Active model replaced, health state reset"
        );
        inner.descriptor = Arc::new(descriptor);
        inner.state = ConnectionState::Unknown;
        inner.generation += 1;
    }

    /// Check that the service answers and lists the configured model.
    ///
    /// On success the state becomes `ReachableModelUnverified`, even if it was
    /// `Operational` before: each check re-evaluates from scratch.
    pub async fn check_reachability(&self, cancel: &CancellationToken) -> InferenceResult<String> {
        let (descriptor, generation) = self.snapshot().await;

        let listed = cancellable(
            cancel,
            self.backend.list_models(self.reachability_timeout),
        )
        .await;

        let (state, result) = match listed {
            Err(InferenceError::Cancelled) => return Err(InferenceError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Inference service unreachable");
                (ConnectionState::Unreachable, Err(e))
            }
            Ok(names) if names.iter().any(|n| descriptor.is_listed_as(n)) => (
                ConnectionState::ReachableModelUnverified,
                Ok(format!(
                    "Connected to {}, model {} available",
                    self.backend.base_url(),
                    descriptor.model
                )),
            ),
            Ok(names) => {
                warn!(
                    model = %descriptor.model,
                    available = ?names,
                    "Configured model not listed by inference service"
                );
                (
                    ConnectionState::ReachableModelMissing,
                    Err(InferenceError::ModelNotListed {
                        model: descriptor.model.clone(),
                        available: names,
                    }),
                )
            }
        };

        self.commit(generation, state).await;
        result
    }

    /// Send a tiny prompt and require a non-empty answer.
    ///
    /// Only meaningful after a successful [`check_reachability`](Self::check_reachability);
    /// otherwise it fails without touching the network or the state.
    pub async fn verify_model_responds(
        &self,
        cancel: &CancellationToken,
    ) -> InferenceResult<String> {
        let (descriptor, generation) = self.snapshot().await;

        let current = self.state().await;
        if !current.is_model_listed() {
            return Err(Self::not_verifiable(&current, &descriptor.model));
        }

        let request = descriptor
            .request(PROBE_PROMPT)
            .with_budget(PROBE_NUM_PREDICT, PROBE_TEMPERATURE)
            .with_timeout(self.probe_timeout);

        let (state, result) = match cancellable(cancel, self.backend.generate(&request)).await {
            Err(InferenceError::Cancelled) => return Err(InferenceError::Cancelled),
            Err(e) => {
                warn!(model = %descriptor.model, error = %e, "Model verification failed");
                (ConnectionState::Degraded(e.to_string()), Err(e))
            }
            Ok(completion) => {
                info!(
                    model = %descriptor.model,
                    duration_secs = completion.duration_secs,
                    "Model verified"
                );
                (
                    ConnectionState::Operational,
                    Ok(format!(
                        "Model responding in {:.1}s",
                        completion.duration_secs
                    )),
                )
            }
        };

        self.commit(generation, state).await;
        result
    }

    async fn snapshot(&self) -> (Arc<ModelDescriptor>, u64) {
        let inner = self.inner.read().await;
        (inner.descriptor.clone(), inner.generation)
    }

    /// Write the new state unless the descriptor changed while the check ran.
    async fn commit(&self, generation: u64, state: ConnectionState) {
        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            warn!(
                discarded = %state,
                "Health check finished after a model switch, result discarded"
            );
            return;
        }
        if inner.state != state {
            info!(from = %inner.state, to = %state, "Connection state changed");
        }
        inner.state = state;
    }

    fn not_verifiable(state: &ConnectionState, model: &str) -> InferenceError {
        match state {
            ConnectionState::ReachableModelMissing => InferenceError::ModelNotListed {
                model: model.to_string(),
                available: Vec::new(),
            },
            _ => InferenceError::Network {
                message: format!("reachability not confirmed (state: {})", state),
            },
        }
    }
}
