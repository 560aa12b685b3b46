//! Deterministic keyword-routed answers used when inference is unavailable.
//!
//! Classification is a case-insensitive substring match against an ordered rule
//! table: the first rule with a matching keyword wins. Rendering is pure and always
//! produces non-empty Markdown-like text.

mod templates;

use serde::Serialize;
use std::fmt;

use crate::context::{AggregateSnapshot, EntityDetail};
use crate::monitor::ConnectionState;

/// Shown when a template (or a model) produced nothing usable.
pub const NO_INFORMATION_MESSAGE: &str = "Não há informações suficientes para responder.";

/// Question category, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    CustomerAnalysis,
    OrderAnalysis,
    ProductSuggestion,
    SystemStatistics,
    ConnectionStatus,
    Help,
    ConceptualDefinition,
    General,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::CustomerAnalysis => "customer_analysis",
            Topic::OrderAnalysis => "order_analysis",
            Topic::ProductSuggestion => "product_suggestion",
            Topic::SystemStatistics => "system_statistics",
            Topic::ConnectionStatus => "connection_status",
            Topic::Help => "help",
            Topic::ConceptualDefinition => "conceptual_definition",
            Topic::General => "general",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a template may read.
#[derive(Debug, Clone, Copy)]
pub struct FallbackInput<'a> {
    pub question: &'a str,
    pub snapshot: &'a AggregateSnapshot,
    pub detail: Option<&'a EntityDetail>,
    pub connection: &'a ConnectionState,
    pub model: &'a str,
}

type Render = fn(&FallbackInput<'_>, &str) -> String;

struct Rule {
    topic: Topic,
    keywords: &'static [&'static str],
    render: Render,
}

const RULES: &[Rule] = &[
    Rule {
        topic: Topic::CustomerAnalysis,
        keywords: &["cliente", "clientes", "customer"],
        render: templates::customer_analysis,
    },
    Rule {
        topic: Topic::OrderAnalysis,
        keywords: &["pedido", "pedidos", "vendas", "histórico", "order", "sales"],
        render: templates::order_analysis,
    },
    Rule {
        topic: Topic::ProductSuggestion,
        keywords: &[
            "sugerir",
            "sugestão",
            "produto",
            "produtos",
            "recomendar",
            "product",
            "suggest",
        ],
        render: templates::product_suggestion,
    },
    Rule {
        topic: Topic::SystemStatistics,
        keywords: &[
            "estatística",
            "estatisticas",
            "dados",
            "banco",
            "bd",
            "relatório",
            "statistic",
            "report",
        ],
        render: templates::system_statistics,
    },
    Rule {
        topic: Topic::ConnectionStatus,
        keywords: &[
            "conectado",
            "conexão",
            "ollama",
            "funcionando",
            "status",
            "connection",
        ],
        render: templates::connection_status,
    },
    Rule {
        topic: Topic::Help,
        keywords: &["ola", "olá", "oi", "help", "ajuda", "como usar"],
        render: templates::help,
    },
    Rule {
        topic: Topic::ConceptualDefinition,
        keywords: &[
            "que é",
            "o que sao",
            "defin",
            "significado",
            "conceito",
            "what is",
        ],
        render: templates::conceptual_definition,
    },
];

/// Classify a question by the first rule whose keyword it contains.
pub fn classify(question: &str) -> Topic {
    let lowered = question.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
        .map(|rule| rule.topic)
        .unwrap_or(Topic::General)
}

/// A rendered fallback answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackAnswer {
    pub topic: Topic,
    pub text: String,
}

/// Renders canned answers from the snapshot and optional entity detail.
#[derive(Debug, Clone)]
pub struct FallbackResponder {
    currency_symbol: String,
}

impl FallbackResponder {
    pub fn new(currency_symbol: impl Into<String>) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Classify the question and render the matching template.
    pub fn respond(&self, input: &FallbackInput<'_>) -> FallbackAnswer {
        self.render(classify(input.question), input)
    }

    /// Render a specific topic regardless of the question's keywords.
    pub fn render(&self, topic: Topic, input: &FallbackInput<'_>) -> FallbackAnswer {
        let render = RULES
            .iter()
            .find(|rule| rule.topic == topic)
            .map(|rule| rule.render)
            .unwrap_or(templates::general as Render);

        let text = render(input, &self.currency_symbol);
        let text = if text.trim().is_empty() {
            NO_INFORMATION_MESSAGE.to_string()
        } else {
            text
        };

        FallbackAnswer { topic, text }
    }
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new("R$")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CustomerRecord, OrderRecord};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn input<'a>(
        question: &'a str,
        snapshot: &'a AggregateSnapshot,
        detail: Option<&'a EntityDetail>,
        connection: &'a ConnectionState,
    ) -> FallbackInput<'a> {
        FallbackInput {
            question,
            snapshot,
            detail,
            connection,
            model: "qwen2.5:0.5b",
        }
    }

    fn order(id: i64, total: &str, status: &str) -> OrderRecord {
        OrderRecord {
            id,
            customer_name: Some("Ana".to_string()),
            date: "2025-03-01".to_string(),
            total: dec(total),
            status: status.to_string(),
        }
    }

    fn ana(orders: Vec<OrderRecord>) -> EntityDetail {
        EntityDetail {
            customer: Some(CustomerRecord {
                id: 1,
                name: "Ana".to_string(),
                email: Some("ana@example.com".to_string()),
                phone: None,
                created_at: "2025-01-01 09:00:00".to_string(),
            }),
            orders,
        }
    }

    #[test]
    fn test_classification_table() {
        let cases = [
            ("Quantos clientes temos?", Topic::CustomerAnalysis),
            ("Analise as VENDAS do mês", Topic::OrderAnalysis),
            ("Pode recomendar algo?", Topic::ProductSuggestion),
            ("Mostre as estatísticas", Topic::SystemStatistics),
            ("O Ollama está funcionando?", Topic::ConnectionStatus),
            ("Preciso de ajuda", Topic::Help),
            ("Qual o significado de ticket médio?", Topic::ConceptualDefinition),
            ("Bom dia", Topic::General),
            ("", Topic::General),
        ];
        for (question, expected) in cases {
            assert_eq!(classify(question), expected, "question: {:?}", question);
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Both customer and order keywords: customer rule comes first
        assert_eq!(classify("pedidos do cliente"), Topic::CustomerAnalysis);
        // Order keyword beats the conceptual phrasing
        assert_eq!(classify("o que é pedido"), Topic::OrderAnalysis);
        assert_eq!(classify("status dos produtos"), Topic::ProductSuggestion);
    }

    #[test]
    fn test_every_topic_renders_non_empty() {
        let responder = FallbackResponder::default();
        let snapshot = AggregateSnapshot::default();
        let state = ConnectionState::Unknown;
        let topics = [
            Topic::CustomerAnalysis,
            Topic::OrderAnalysis,
            Topic::ProductSuggestion,
            Topic::SystemStatistics,
            Topic::ConnectionStatus,
            Topic::Help,
            Topic::ConceptualDefinition,
            Topic::General,
        ];
        for topic in topics {
            let answer = responder.render(topic, &input("", &snapshot, None, &state));
            assert_eq!(answer.topic, topic);
            assert!(!answer.text.trim().is_empty(), "{} rendered empty", topic);
        }
    }

    #[test]
    fn test_respond_is_deterministic() {
        let responder = FallbackResponder::default();
        let snapshot = AggregateSnapshot {
            total_orders: 3,
            completed_revenue: dec("300"),
            ..Default::default()
        };
        let state = ConnectionState::Unreachable;
        let question = "Resumo das vendas";
        assert_eq!(
            responder.respond(&input(question, &snapshot, None, &state)),
            responder.respond(&input(question, &snapshot, None, &state))
        );
    }

    #[test]
    fn test_customer_analysis_with_detail() {
        let responder = FallbackResponder::default();
        let snapshot = AggregateSnapshot::default();
        let detail = ana(vec![order(1, "100", "Concluído"), order(2, "50", "Pendente")]);
        let state = ConnectionState::Unreachable;

        let answer = responder.respond(&input(
            "Analisar cliente",
            &snapshot,
            Some(&detail),
            &state,
        ));

        assert_eq!(answer.topic, Topic::CustomerAnalysis);
        assert!(answer.text.contains("**Nome:** Ana"));
        assert!(answer.text.contains("**Email:** ana@example.com"));
        assert!(!answer.text.contains("Telefone"));
        assert!(answer.text.contains("**Total de Pedidos:** 2"));
        assert!(answer.text.contains("**Total Gasto:** R$ 150.00"));
        assert!(answer.text.contains("**Ticket Médio:** R$ 75.00"));
        assert!(answer.text.contains("conecte a IA"));
    }

    #[test]
    fn test_hint_omitted_when_operational() {
        let responder = FallbackResponder::default();
        let snapshot = AggregateSnapshot::default();
        let detail = ana(vec![order(1, "100", "Concluído")]);
        let state = ConnectionState::Operational;

        let answer = responder.respond(&input("cliente", &snapshot, Some(&detail), &state));
        assert!(!answer.text.contains("conecte a IA"));
    }

    #[test]
    fn test_order_analysis_status_breakdown() {
        let responder = FallbackResponder::default();
        let snapshot = AggregateSnapshot::default();
        let detail = EntityDetail::from_orders(vec![
            order(1, "10", "Concluído"),
            order(2, "20", "Concluído"),
            order(3, "30", "Cancelado"),
        ]);
        let state = ConnectionState::Unknown;

        let answer = responder.render(
            Topic::OrderAnalysis,
            &input("", &snapshot, Some(&detail), &state),
        );

        assert!(answer.text.contains("**Total de Pedidos:** 3"));
        assert!(answer.text.contains("**Valor Total:** R$ 60.00"));
        assert!(answer.text.contains("**Ticket Médio:** R$ 20.00"));
        assert!(answer.text.contains("• Cancelado: 1"));
        assert!(answer.text.contains("• Concluído: 2"));
    }

    #[test]
    fn test_product_suggestion_profiles() {
        let responder = FallbackResponder::default();
        let snapshot = AggregateSnapshot::default();
        let state = ConnectionState::Unknown;
        let cases = [
            (vec![order(1, "600", "Concluído")], "Cliente Premium"),
            (vec![order(1, "500", "Concluído")], "Cliente Intermediário"),
            (vec![order(1, "200", "Concluído")], "Cliente Básico"),
            (vec![], "Novo Cliente"),
        ];
        for (orders, profile) in cases {
            let detail = ana(orders);
            let answer = responder.render(
                Topic::ProductSuggestion,
                &input("", &snapshot, Some(&detail), &state),
            );
            assert!(answer.text.contains(profile), "expected {}", profile);
        }
    }

    #[test]
    fn test_connection_status_reports_state() {
        let responder = FallbackResponder::default();
        let snapshot = AggregateSnapshot::default();

        let state = ConnectionState::Operational;
        let answer = responder.respond(&input("status", &snapshot, None, &state));
        assert!(answer.text.contains("IA Funcionando"));
        assert!(answer.text.contains("qwen2.5:0.5b"));

        let state = ConnectionState::Degraded("empty response".to_string());
        let answer = responder.respond(&input("status", &snapshot, None, &state));
        assert!(answer.text.contains("Problemas"));
        assert!(answer.text.contains("empty response"));

        let state = ConnectionState::Unreachable;
        let answer = responder.respond(&input("status", &snapshot, None, &state));
        assert!(answer.text.contains("Modo Básico"));
    }
}
