//! End-to-end tests for the query orchestrator
//!
//! The inference service is mocked with wiremock; the business store is an
//! in-memory fake so every scenario sees the same aggregates.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use wiremock::{
    matchers::{body_partial_json, body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use bizdesk_assistant::config::{
    Config, ContextConfig, DatabaseConfig, GenerationConfig, LogFormat, LoggingConfig,
    OllamaConfig, ReconnectConfig, ReconnectPolicy,
};
use bizdesk_assistant::error::StorageResult;
use bizdesk_assistant::inference::OllamaClient;
use bizdesk_assistant::monitor::ConnectionState;
use bizdesk_assistant::orchestrator::{AnswerSource, QueryOrchestrator};
use bizdesk_assistant::prompts::PROBE_PROMPT;
use bizdesk_assistant::storage::{
    AggregateQueryService, CustomerRecord, OrderRecord, ProductRecord, RevenueSummary,
    StatusCount,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Two customers, one product, one completed order
struct FakeStore;

fn ana() -> CustomerRecord {
    CustomerRecord {
        id: 1,
        name: "Ana".to_string(),
        email: Some("ana@example.com".to_string()),
        phone: None,
        created_at: "2025-01-01 10:00:00".to_string(),
    }
}

fn ana_order() -> OrderRecord {
    OrderRecord {
        id: 1,
        customer_name: Some("Ana".to_string()),
        date: "2025-02-01".to_string(),
        total: dec("120.00"),
        status: "Concluído".to_string(),
    }
}

#[async_trait]
impl AggregateQueryService for FakeStore {
    async fn count_customers(&self) -> StorageResult<i64> {
        Ok(2)
    }
    async fn count_products(&self) -> StorageResult<i64> {
        Ok(1)
    }
    async fn count_orders(&self) -> StorageResult<i64> {
        Ok(1)
    }
    async fn orders_by_status(&self) -> StorageResult<Vec<StatusCount>> {
        Ok(vec![StatusCount {
            status: "Concluído".to_string(),
            count: 1,
        }])
    }
    async fn completed_revenue(&self) -> StorageResult<RevenueSummary> {
        Ok(RevenueSummary {
            total: dec("120.00"),
            average: dec("120.00"),
        })
    }
    async fn recent_customers(&self, _limit: u32) -> StorageResult<Vec<CustomerRecord>> {
        Ok(vec![ana()])
    }
    async fn recent_orders(&self, _limit: u32) -> StorageResult<Vec<OrderRecord>> {
        Ok(vec![ana_order()])
    }
    async fn top_stock_products(&self, _limit: u32) -> StorageResult<Vec<ProductRecord>> {
        Ok(vec![ProductRecord {
            id: 1,
            name: "Caneta".to_string(),
            price: dec("2.50"),
            stock: 100,
        }])
    }
    async fn customer(&self, id: i64) -> StorageResult<Option<CustomerRecord>> {
        Ok((id == 1).then(ana))
    }
    async fn customer_orders(&self, customer_id: i64) -> StorageResult<Vec<OrderRecord>> {
        Ok(if customer_id == 1 {
            vec![ana_order()]
        } else {
            Vec::new()
        })
    }
}

fn test_config(base_url: &str) -> Config {
    Config {
        ollama: OllamaConfig {
            base_url: base_url.to_string(),
            model: "x:0.5b".to_string(),
            timeout_ms: 2000,
            reachability_timeout_ms: 1000,
            probe_timeout_ms: 1000,
        },
        generation: GenerationConfig::default(),
        database: DatabaseConfig {
            path: PathBuf::from(":memory:"),
            max_connections: 1,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
        },
        context: ContextConfig::default(),
        reconnect: ReconnectConfig {
            policy: ReconnectPolicy::Never,
            delay_ms: 10,
        },
    }
}

fn create_orchestrator(base_url: &str) -> QueryOrchestrator {
    let config = test_config(base_url);
    let client = OllamaClient::new(&config.ollama).expect("Failed to create client");
    QueryOrchestrator::new(&config, Arc::new(client), Arc::new(FakeStore))
        .expect("Failed to create orchestrator")
}

async fn mount_tags(server: &MockServer, names: &[&str]) {
    let models: Vec<_> = names.iter().map(|n| json!({ "name": n })).collect();
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": models })))
        .mount(server)
        .await;
}

async fn mount_probe(server: &MockServer, response: &str) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "prompt": PROBE_PROMPT })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": response,
            "total_duration": 300_000_000u64
        })))
        .mount(server)
        .await;
}

/// Generation mock for real questions, asserting how often it is hit
async fn mount_question(server: &MockServer, body: serde_json::Value, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("Pergunta:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_service_down_falls_back() {
        let orchestrator = create_orchestrator("http://127.0.0.1:9");

        let result = orchestrator.answer("quantos clientes?", None).await.unwrap();

        assert_eq!(result.source, AnswerSource::Fallback);
        assert!(!result.answer.trim().is_empty());
        let diagnostic = result.diagnostic.expect("fallback carries a reason");
        assert!(
            diagnostic.contains("unreachable") || diagnostic.contains("timed out"),
            "unexpected diagnostic: {}",
            diagnostic
        );
        assert_eq!(orchestrator.monitor().state().await, ConnectionState::Unreachable);
    }

    #[tokio::test]
    async fn test_listing_failure_never_generates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503).set_body_string("starting"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let result = create_orchestrator(&server.uri())
            .answer("quantos clientes?", None)
            .await
            .unwrap();

        assert_eq!(result.source, AnswerSource::Fallback);
    }

    #[tokio::test]
    async fn test_model_missing_falls_back() {
        let server = MockServer::start().await;
        mount_tags(&server, &["other-model"]).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let orchestrator = create_orchestrator(&server.uri());
        let result = orchestrator.answer("quantos clientes?", None).await.unwrap();

        assert_eq!(result.source, AnswerSource::Fallback);
        assert!(result.diagnostic.unwrap().contains("x:0.5b"));
        assert_eq!(
            orchestrator.monitor().state().await,
            ConnectionState::ReachableModelMissing
        );
    }

    #[tokio::test]
    async fn test_empty_probe_degrades() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b"]).await;
        mount_probe(&server, "").await;
        mount_question(&server, json!({"response": "x"}), 0).await;

        let orchestrator = create_orchestrator(&server.uri());
        let result = orchestrator.answer("quantos clientes?", None).await.unwrap();

        assert_eq!(result.source, AnswerSource::Fallback);
        assert_eq!(result.diagnostic.as_deref(), Some("empty response"));
        assert!(matches!(
            orchestrator.monitor().state().await,
            ConnectionState::Degraded(_)
        ));
    }

    #[tokio::test]
    async fn test_fully_operational_uses_inference() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b-instruct"]).await;
        mount_probe(&server, "OK").await;
        mount_question(
            &server,
            json!({"response": "  texto...  ", "total_duration": 2_500_000_000u64}),
            1,
        )
        .await;

        let orchestrator = create_orchestrator(&server.uri());
        let result = orchestrator.answer("quantos clientes?", None).await.unwrap();

        assert_eq!(result.source, AnswerSource::Inference);
        assert_eq!(result.answer, "texto...");
        assert_eq!(result.diagnostic, None);
        assert!(orchestrator.monitor().state().await.is_operational());
    }

    #[tokio::test]
    async fn test_generation_body_without_response_is_protocol_error() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b"]).await;
        mount_probe(&server, "OK").await;
        mount_question(&server, json!({"done": true}), 1).await;

        let orchestrator = create_orchestrator(&server.uri());
        let result = orchestrator.answer("quantos clientes?", None).await.unwrap();

        assert_eq!(result.source, AnswerSource::Fallback);
        let diagnostic = result.diagnostic.expect("fallback carries a diagnostic");
        assert!(diagnostic.starts_with("Protocol error"), "got {}", diagnostic);
    }

    #[tokio::test]
    async fn test_prompt_grounded_in_snapshot() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b"]).await;
        mount_probe(&server, "OK").await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_string_contains("Clientes: 2 | Produtos: 1 | Pedidos: 1"))
            .and(body_string_contains("Contexto: mês de fevereiro"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = create_orchestrator(&server.uri())
            .answer("Como foram as vendas?", Some("mês de fevereiro"))
            .await
            .unwrap();

        assert_eq!(result.source, AnswerSource::Inference);
    }

    #[tokio::test]
    async fn test_generation_error_falls_back_to_order_template() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b"]).await;
        mount_probe(&server, "OK").await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_string_contains("Pergunta:"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"error": "out of memory"})),
            )
            .mount(&server)
            .await;

        let result = create_orchestrator(&server.uri())
            .answer("Resumo dos pedidos", None)
            .await
            .unwrap();

        assert_eq!(result.source, AnswerSource::Fallback);
        assert!(result.answer.contains("Análise dos Pedidos"));
        assert!(result.answer.contains("R$ 120.00"));
        assert!(result.diagnostic.unwrap().contains("out of memory"));
    }
}

#[cfg(test)]
mod status_tests {
    use super::*;

    #[tokio::test]
    async fn test_switch_model_requires_reverification() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b", "llama3.2:1b"]).await;
        mount_probe(&server, "OK").await;

        let orchestrator = create_orchestrator(&server.uri());
        let (ok, message) = orchestrator.check_connection().await;
        assert!(ok, "check failed: {}", message);
        assert!(orchestrator.status_snapshot().await.model_operational);

        assert!(orchestrator.switch_model("llama3.2:1b").await);
        let status = orchestrator.status_snapshot().await;
        assert!(status.connected);
        assert!(!status.model_operational);
        assert_eq!(status.active_model, "llama3.2:1b");
        assert_eq!(status.base_url, server.uri());
        assert_eq!(status.timeout_seconds, 2);

        let (ok, _) = orchestrator.check_connection().await;
        assert!(ok);
        assert!(orchestrator.status_snapshot().await.model_operational);
    }

    #[tokio::test]
    async fn test_switch_to_unlisted_model() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b"]).await;

        let orchestrator = create_orchestrator(&server.uri());
        assert!(!orchestrator.switch_model("mistral:7b").await);
        assert_eq!(
            orchestrator.monitor().state().await,
            ConnectionState::ReachableModelMissing
        );
    }

    #[tokio::test]
    async fn test_status_before_any_check() {
        let orchestrator = create_orchestrator("http://127.0.0.1:9");
        let status = orchestrator.status_snapshot().await;

        assert!(!status.connected);
        assert!(!status.model_operational);
        assert_eq!(status.active_model, "x:0.5b");
        assert_eq!(status.state, ConnectionState::Unknown);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_answers_are_independent() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b"]).await;
        mount_probe(&server, "OK").await;
        mount_question(&server, json!({"response": "resposta"}), 2).await;

        let orchestrator = Arc::new(create_orchestrator(&server.uri()));
        let first = orchestrator.spawn_answer("quantos clientes?".to_string(), None);
        let second = orchestrator.spawn_answer("quais produtos?".to_string(), None);

        let (first, second) = (first.await.unwrap().unwrap(), second.await.unwrap().unwrap());
        assert_eq!(first.source, AnswerSource::Inference);
        assert_eq!(second.source, AnswerSource::Inference);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_answer() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b"]).await;

        let orchestrator = create_orchestrator(&server.uri());
        orchestrator.shutdown();

        let result = orchestrator
            .answer_query(
                bizdesk_assistant::orchestrator::Query::new("quantos clientes?"),
                &orchestrator.request_token(),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(orchestrator.monitor().state().await, ConnectionState::Unknown);
    }
}

#[cfg(test)]
mod analysis_tests {
    use super::*;

    #[tokio::test]
    async fn test_analyze_customer_offline() {
        let orchestrator = create_orchestrator("http://127.0.0.1:9");
        let detail = orchestrator.load_customer(1).await.unwrap();

        let result = orchestrator.analyze_customer(&detail).await.unwrap();

        assert_eq!(result.source, AnswerSource::Fallback);
        assert!(result.answer.contains("**Nome:** Ana"));
        assert!(result.answer.contains("**Ticket Médio:** R$ 120.00"));
    }

    #[tokio::test]
    async fn test_analyze_orders_offline() {
        let orchestrator = create_orchestrator("http://127.0.0.1:9");

        let result = orchestrator.analyze_orders(&[ana_order()]).await.unwrap();

        assert_eq!(result.source, AnswerSource::Fallback);
        assert!(result.answer.contains("**Total de Pedidos:** 1"));
        assert!(result.answer.contains("• Concluído: 1"));
    }

    #[tokio::test]
    async fn test_suggest_products_with_inference() {
        let server = MockServer::start().await;
        mount_tags(&server, &["x:0.5b"]).await;
        mount_probe(&server, "OK").await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_string_contains("CLIENTE: Ana"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"response": "Cadernos."})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let orchestrator = create_orchestrator(&server.uri());
        let detail = orchestrator.load_customer(1).await.unwrap();
        let result = orchestrator.suggest_products(&detail).await.unwrap();

        assert_eq!(result.source, AnswerSource::Inference);
        assert_eq!(result.answer, "Cadernos.");
    }
}

#[cfg(test)]
mod construction_tests {
    use super::*;
    use bizdesk_assistant::error::AppError;

    #[tokio::test]
    async fn test_invalid_config_rejected_with_injected_backend() {
        let server = MockServer::start().await;
        mount_tags(&server, &["other-model"]).await;
        let client = OllamaClient::new(&test_config(&server.uri()).ollama).unwrap();
        let client = Arc::new(client);

        let mut config = test_config(&server.uri());
        config.ollama.model = String::new();
        let result = QueryOrchestrator::new(&config, client.clone(), Arc::new(FakeStore));
        assert!(matches!(result, Err(AppError::Config { .. })));

        let mut config = test_config(&server.uri());
        config.context.max_chars = 0;
        let result = QueryOrchestrator::new(&config, client, Arc::new(FakeStore));
        assert!(matches!(result, Err(AppError::Config { .. })));
    }
}
