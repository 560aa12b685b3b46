//! Question answering entry point.
//!
//! The [`QueryOrchestrator`] runs the health checks, grounds the question in a
//! fresh [`AggregateSnapshot`], asks the inference service and falls back to the
//! deterministic [`FallbackResponder`] on any failure. Callers always get a
//! non-empty [`AnswerResult`]; only cancellation is reported separately.

use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, ReconnectConfig, ReconnectPolicy};
use crate::context::{
    format_money, AggregateSnapshot, ContextAssembler, EntityDetail, SnapshotLimits,
};
use crate::error::{AppResult, ErrorKind, InferenceError, InferenceResult, StorageResult};
use crate::fallback::{FallbackInput, FallbackResponder, Topic, NO_INFORMATION_MESSAGE};
use crate::inference::{cancellable, InferenceBackend, ModelDescriptor};
use crate::monitor::{ConnectionMonitor, ConnectionState};
use crate::prompts::{
    build_answer_prompt, CUSTOMER_ANALYSIS_QUESTION, ORDER_ANALYSIS_QUESTION,
    PRODUCT_SUGGESTION_QUESTION,
};
use crate::storage::{AggregateQueryService, OrderRecord};

/// Text shown to a user whose question was cancelled.
pub const CANCELLED_MESSAGE: &str = "Consulta cancelada.";

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Inference,
    Fallback,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Inference => "inference",
            AnswerSource::Fallback => "fallback",
        }
    }
}

/// The answer handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    /// Never empty
    pub answer: String,
    pub source: AnswerSource,
    /// Why the fallback was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl AnswerResult {
    fn inference(text: String) -> Self {
        let answer = if text.trim().is_empty() {
            NO_INFORMATION_MESSAGE.to_string()
        } else {
            text
        };
        Self {
            answer,
            source: AnswerSource::Inference,
            diagnostic: None,
        }
    }

    fn fallback(answer: String, reason: impl Into<String>) -> Self {
        Self {
            answer,
            source: AnswerSource::Fallback,
            diagnostic: Some(reason.into()),
        }
    }
}

/// The call was cancelled before it produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Request cancelled")]
pub struct Cancelled;

/// Connection summary for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub model_operational: bool,
    pub active_model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub state: ConnectionState,
}

/// One question and what grounds it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query<'a> {
    pub question: &'a str,
    /// Free text appended to the prompt context
    pub extra_context: Option<&'a str>,
    /// Entity detail offered to the fallback templates
    pub detail: Option<&'a EntityDetail>,
    /// Fallback template to use instead of keyword classification
    pub topic: Option<Topic>,
}

impl<'a> Query<'a> {
    pub fn new(question: &'a str) -> Self {
        Self {
            question,
            ..Default::default()
        }
    }

    pub fn with_context(mut self, extra: Option<&'a str>) -> Self {
        self.extra_context = extra;
        self
    }

    pub fn with_detail(mut self, detail: &'a EntityDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }
}

/// Whether a failed inference call of `kind` schedules a background probe.
fn should_probe(policy: ReconnectPolicy, kind: ErrorKind) -> bool {
    match (policy, kind) {
        (_, ErrorKind::Cancelled) => false,
        (ReconnectPolicy::Always, _) => true,
        (ReconnectPolicy::TransportOnly, kind) => kind.is_transport(),
        (ReconnectPolicy::Never, _) => false,
    }
}

/// Routes questions to the inference service or the fallback responder.
///
/// Built once at startup and shared by reference (or `Arc`). Concurrent calls are
/// independent; the only shared mutable state lives in the [`ConnectionMonitor`].
pub struct QueryOrchestrator {
    backend: Arc<dyn InferenceBackend>,
    monitor: Arc<ConnectionMonitor>,
    store: Arc<dyn AggregateQueryService>,
    assembler: ContextAssembler,
    responder: FallbackResponder,
    limits: SnapshotLimits,
    reconnect: ReconnectConfig,
    list_timeout: Duration,
    shutdown: CancellationToken,
}

impl QueryOrchestrator {
    /// Create an orchestrator with its own connection monitor.
    ///
    /// Fails with [`AppError::Config`](crate::error::AppError::Config) when the
    /// configuration is invalid, whatever backend is injected.
    pub fn new(
        config: &Config,
        backend: Arc<dyn InferenceBackend>,
        store: Arc<dyn AggregateQueryService>,
    ) -> AppResult<Self> {
        config.validate()?;

        let descriptor = ModelDescriptor::new(&config.ollama, &config.generation);
        let monitor = Arc::new(ConnectionMonitor::new(
            backend.clone(),
            descriptor,
            &config.ollama,
        ));

        Ok(Self {
            backend,
            monitor,
            store,
            assembler: ContextAssembler::from_config(&config.context),
            responder: FallbackResponder::new(config.context.currency_symbol.clone()),
            limits: SnapshotLimits::from(&config.context),
            reconnect: config.reconnect.clone(),
            list_timeout: Duration::from_millis(config.ollama.reachability_timeout_ms),
            shutdown: CancellationToken::new(),
        })
    }

    /// The shared connection monitor
    pub fn monitor(&self) -> &Arc<ConnectionMonitor> {
        &self.monitor
    }

    /// A token cancelled by [`shutdown`](Self::shutdown), for one call.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancel in-flight calls and pending reconnection probes.
    pub fn shutdown(&self) {
        info!("Query orchestrator shutting down");
        self.shutdown.cancel();
    }

    /// Answer a question, always producing non-empty text unless cancelled by
    /// [`shutdown`](Self::shutdown).
    pub async fn answer(
        &self,
        question: &str,
        extra_context: Option<&str>,
    ) -> Result<AnswerResult, Cancelled> {
        let query = Query::new(question).with_context(extra_context);
        self.answer_query(query, &self.request_token()).await
    }

    /// Run `answer` on its own task.
    pub fn spawn_answer(
        self: &Arc<Self>,
        question: String,
        extra_context: Option<String>,
    ) -> JoinHandle<Result<AnswerResult, Cancelled>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator
                .answer(&question, extra_context.as_deref())
                .await
        })
    }

    /// Full pipeline under a caller-supplied cancellation token.
    ///
    /// Health checks strictly precede generation. Any service failure produces a
    /// fallback answer; cancellation aborts without one.
    pub async fn answer_query(
        &self,
        query: Query<'_>,
        cancel: &CancellationToken,
    ) -> Result<AnswerResult, Cancelled> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, question = %query.question, "Answering question");

        if let Err(e) = self.monitor.check_reachability(cancel).await {
            return self.fallback_for(query, &e, cancel).await;
        }
        if let Err(e) = self.monitor.verify_model_responds(cancel).await {
            return self.fallback_for(query, &e, cancel).await;
        }

        let snapshot = self.collect_snapshot(cancel).await?;
        let context = self.assembler.assemble(&snapshot, query.extra_context);
        debug!(%request_id, chars = context.char_len(), "Context assembled");
        let descriptor = self.monitor.descriptor().await;
        let request = descriptor.request(build_answer_prompt(context.as_str(), query.question));

        match cancellable(cancel, self.backend.generate(&request)).await {
            Ok(completion) => {
                info!(
                    %request_id,
                    model = %descriptor.model,
                    duration_secs = completion.duration_secs,
                    "Answered with inference"
                );
                Ok(AnswerResult::inference(completion.text))
            }
            Err(InferenceError::Cancelled) => Err(Cancelled),
            Err(e) => {
                warn!(
                    %request_id,
                    error = %e,
                    kind = %e.kind(),
                    "Inference failed, using fallback"
                );
                self.schedule_reconnect(e.kind());
                Ok(self.render_fallback(query, &snapshot, e.to_string()).await)
            }
        }
    }

    /// Run reachability then verification, reporting the outcome as text.
    pub async fn check_connection(&self) -> (bool, String) {
        let cancel = self.request_token();

        let reachable = match self.monitor.check_reachability(&cancel).await {
            Ok(message) => message,
            Err(e) => return (false, e.to_string()),
        };

        match self.monitor.verify_model_responds(&cancel).await {
            Ok(verified) => (true, format!("{}. {}", reachable, verified)),
            Err(e) => (false, e.to_string()),
        }
    }

    /// Switch the active model and re-check reachability.
    ///
    /// The model is never operational right after a switch: verification must be
    /// re-run explicitly.
    pub async fn switch_model(&self, model: &str) -> bool {
        let model = model.trim();
        if model.is_empty() {
            warn!("Refusing to switch to an empty model id");
            return false;
        }

        let descriptor = self.monitor.descriptor().await.with_model(model);
        self.monitor.replace_descriptor(descriptor).await;

        match self.monitor.check_reachability(&self.request_token()).await {
            Ok(message) => {
                info!(model, %message, "Model switched");
                true
            }
            Err(e) => {
                warn!(model, error = %e, "Model switched but not reachable");
                false
            }
        }
    }

    /// Current connection summary, without any network call.
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let state = self.monitor.state().await;
        let descriptor = self.monitor.descriptor().await;
        StatusSnapshot {
            connected: state.is_reachable(),
            model_operational: state.is_operational(),
            active_model: descriptor.model.clone(),
            base_url: self.backend.base_url(),
            timeout_seconds: descriptor.timeout.as_secs(),
            state,
        }
    }

    /// Models listed by the inference service.
    pub async fn list_models(&self) -> InferenceResult<Vec<String>> {
        cancellable(
            &self.request_token(),
            self.backend.list_models(self.list_timeout),
        )
        .await
    }

    /// Load a customer and their orders from the store.
    pub async fn load_customer(&self, customer_id: i64) -> StorageResult<EntityDetail> {
        EntityDetail::load(self.store.as_ref(), customer_id).await
    }

    /// Answer a free question about one customer.
    ///
    /// The customer summary is placed ahead of any caller context so it survives
    /// truncation of a long `extra_context`.
    pub async fn answer_about(
        &self,
        question: &str,
        extra_context: Option<&str>,
        detail: &EntityDetail,
    ) -> Result<AnswerResult, Cancelled> {
        let mut extra = describe_customer(detail, self.assembler.currency_symbol());
        if let Some(text) = extra_context.map(str::trim).filter(|s| !s.is_empty()) {
            let _ = write!(extra, " | {}", text);
        }
        let query = Query::new(question)
            .with_context(Some(&extra))
            .with_detail(detail);
        self.answer_query(query, &self.request_token()).await
    }

    /// Profile and order history analysis of one customer.
    pub async fn analyze_customer(&self, detail: &EntityDetail) -> Result<AnswerResult, Cancelled> {
        if detail.customer.is_none() {
            return Ok(AnswerResult::fallback(
                "Não há dados de cliente disponíveis para análise.".to_string(),
                "no customer data",
            ));
        }

        let extra = describe_customer(detail, self.assembler.currency_symbol());
        let query = Query::new(CUSTOMER_ANALYSIS_QUESTION)
            .with_context(Some(&extra))
            .with_detail(detail)
            .with_topic(Topic::CustomerAnalysis);
        self.answer_query(query, &self.request_token()).await
    }

    /// Count, total, average ticket and status mix of a list of orders.
    pub async fn analyze_orders(&self, orders: &[OrderRecord]) -> Result<AnswerResult, Cancelled> {
        if orders.is_empty() {
            return Ok(AnswerResult::fallback(
                "Não há dados de pedidos disponíveis.".to_string(),
                "no order data",
            ));
        }

        let detail = EntityDetail::from_orders(orders.to_vec());
        let extra = describe_orders(&detail, self.assembler.currency_symbol());
        let query = Query::new(ORDER_ANALYSIS_QUESTION)
            .with_context(Some(&extra))
            .with_detail(&detail)
            .with_topic(Topic::OrderAnalysis);
        self.answer_query(query, &self.request_token()).await
    }

    /// Product suggestions for one customer.
    pub async fn suggest_products(&self, detail: &EntityDetail) -> Result<AnswerResult, Cancelled> {
        if detail.customer.is_none() {
            return Ok(AnswerResult::fallback(
                "Não há dados de cliente disponíveis para sugestões.".to_string(),
                "no customer data",
            ));
        }

        let extra = describe_customer(detail, self.assembler.currency_symbol());
        let query = Query::new(PRODUCT_SUGGESTION_QUESTION)
            .with_context(Some(&extra))
            .with_detail(detail)
            .with_topic(Topic::ProductSuggestion);
        self.answer_query(query, &self.request_token()).await
    }

    async fn collect_snapshot(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AggregateSnapshot, Cancelled> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            snapshot = AggregateSnapshot::collect(self.store.as_ref(), self.limits) => Ok(snapshot),
        }
    }

    async fn fallback_for(
        &self,
        query: Query<'_>,
        error: &InferenceError,
        cancel: &CancellationToken,
    ) -> Result<AnswerResult, Cancelled> {
        if matches!(error, InferenceError::Cancelled) {
            return Err(Cancelled);
        }
        info!(reason = %error, "Inference unavailable, using fallback");
        let snapshot = self.collect_snapshot(cancel).await?;
        Ok(self.render_fallback(query, &snapshot, error.to_string()).await)
    }

    async fn render_fallback(
        &self,
        query: Query<'_>,
        snapshot: &AggregateSnapshot,
        reason: String,
    ) -> AnswerResult {
        let connection = self.monitor.state().await;
        let descriptor = self.monitor.descriptor().await;
        let input = FallbackInput {
            question: query.question,
            snapshot,
            detail: query.detail,
            connection: &connection,
            model: &descriptor.model,
        };

        let answer = match query.topic {
            Some(topic) => self.responder.render(topic, &input),
            None => self.responder.respond(&input),
        };
        debug!(topic = %answer.topic, "Fallback answer rendered");

        AnswerResult::fallback(answer.text, reason)
    }

    /// Re-run the health checks in the background after a failed generation.
    fn schedule_reconnect(&self, kind: ErrorKind) {
        if !should_probe(self.reconnect.policy, kind) {
            return;
        }

        let monitor = Arc::clone(&self.monitor);
        let cancel = self.shutdown.child_token();
        let delay = Duration::from_millis(self.reconnect.delay_ms);

        debug!(kind = %kind, delay_ms = self.reconnect.delay_ms, "Scheduling reconnection probe");

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            match monitor.check_reachability(&cancel).await {
                Ok(_) => match monitor.verify_model_responds(&cancel).await {
                    Ok(message) => info!(%message, "Reconnection probe succeeded"),
                    Err(e) => debug!(error = %e, "Reconnection probe: model not responding"),
                },
                Err(e) => debug!(error = %e, "Reconnection probe: service unreachable"),
            }
        });
    }
}

/// One-line customer summary for the prompt context.
fn describe_customer(detail: &EntityDetail, currency: &str) -> String {
    let mut out = String::from("CLIENTE:");
    if let Some(customer) = &detail.customer {
        let _ = write!(out, " {}", customer.name);
        if let Some(email) = customer.email.as_deref().filter(|e| !e.is_empty()) {
            let _ = write!(out, " | Email: {}", email);
        }
        if let Some(phone) = customer.phone.as_deref().filter(|p| !p.is_empty()) {
            let _ = write!(out, " | Telefone: {}", phone);
        }
        let _ = write!(out, " | Desde: {}", customer.created_at);
    }
    let _ = write!(out, " | Pedidos: {}", detail.orders.len());
    if let Some(ticket) = detail.average_ticket() {
        let _ = write!(
            out,
            " | Total gasto: {} | Ticket médio: {}",
            format_money(currency, detail.total_spent()),
            format_money(currency, ticket)
        );
    }
    out
}

/// One-line order list summary for the prompt context.
fn describe_orders(detail: &EntityDetail, currency: &str) -> String {
    let mut out = format!(
        "PEDIDOS: {} | Total: {}",
        detail.orders.len(),
        format_money(currency, detail.total_spent())
    );
    if let Some(ticket) = detail.average_ticket() {
        let _ = write!(out, " | Ticket médio: {}", format_money(currency, ticket));
    }
    let statuses: Vec<String> = detail
        .status_breakdown()
        .into_iter()
        .map(|(status, count)| format!("{}={}", status, count))
        .collect();
    if !statuses.is_empty() {
        let _ = write!(out, " | Status: {}", statuses.join(", "));
    }
    out
}
