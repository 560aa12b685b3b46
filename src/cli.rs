//! Command-line interface.
//!
//! Each subcommand drives one operation of the [`QueryOrchestrator`] and renders
//! the outcome as text (or JSON where requested).

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::orchestrator::{AnswerResult, Cancelled, QueryOrchestrator, CANCELLED_MESSAGE};

/// Business assistant CLI
#[derive(Parser, Debug)]
#[command(name = "bizdesk-assistant")]
#[command(about = "Answer business questions with a local model and a deterministic fallback")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Assistant subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Ask a question about the business data
    Ask {
        /// The question, in natural language
        question: String,

        /// Extra context appended to the prompt
        #[arg(long)]
        context: Option<String>,

        /// Ground the question in one customer's data
        #[arg(long)]
        customer: Option<i64>,

        /// Print the full answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the reachability and model checks
    Check,

    /// Show the connection status without touching the network
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the models offered by the inference service
    Models,

    /// Analyze one customer and their orders
    AnalyzeCustomer {
        /// Customer id
        id: i64,
    },

    /// Suggest products for one customer
    SuggestProducts {
        /// Customer id
        id: i64,
    },
}

/// Result of CLI command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a CLI command against the orchestrator.
pub async fn execute_command(command: Commands, orchestrator: &QueryOrchestrator) -> CliResult {
    match command {
        Commands::Ask {
            question,
            context,
            customer,
            json,
        } => execute_ask(orchestrator, &question, context.as_deref(), customer, json).await,
        Commands::Check => execute_check(orchestrator).await,
        Commands::Status { json } => execute_status(orchestrator, json).await,
        Commands::Models => execute_models(orchestrator).await,
        Commands::AnalyzeCustomer { id } => execute_analyze_customer(orchestrator, id).await,
        Commands::SuggestProducts { id } => execute_suggest_products(orchestrator, id).await,
    }
}

async fn execute_ask(
    orchestrator: &QueryOrchestrator,
    question: &str,
    context: Option<&str>,
    customer: Option<i64>,
    json: bool,
) -> CliResult {
    if question.trim().is_empty() {
        return CliResult::error("Question cannot be empty");
    }

    let result = match customer {
        Some(id) => match orchestrator.load_customer(id).await {
            Ok(detail) if detail.customer.is_some() => {
                orchestrator.answer_about(question, context, &detail).await
            }
            Ok(_) => return CliResult::error(format!("Customer {} not found", id)),
            Err(e) => {
                warn!(customer = id, error = %e, "Customer lookup failed, answering without it");
                orchestrator.answer(question, context).await
            }
        },
        None => orchestrator.answer(question, context).await,
    };

    render_answer(result, json)
}

async fn execute_check(orchestrator: &QueryOrchestrator) -> CliResult {
    let (ok, message) = orchestrator.check_connection().await;
    let state = orchestrator.monitor().state().await;
    let output = format!("{} ({})", message, state);
    if ok {
        CliResult::success(output)
    } else {
        CliResult::error(output)
    }
}

async fn execute_status(orchestrator: &QueryOrchestrator, json: bool) -> CliResult {
    let status = orchestrator.status_snapshot().await;

    if json {
        return match serde_json::to_string_pretty(&status) {
            Ok(body) => CliResult::success(body),
            Err(e) => CliResult::error(format!("Failed to serialize status: {}", e)),
        };
    }

    let mut output = String::new();
    output.push_str("\nAssistant Status\n");
    output.push_str("════════════════════════════════════════\n\n");
    output.push_str(&format!("State:            {}\n", status.state));
    output.push_str(&format!("Connected:        {}\n", yes_no(status.connected)));
    output.push_str(&format!(
        "Model operational: {}\n",
        yes_no(status.model_operational)
    ));
    output.push_str(&format!("Active model:     {}\n", status.active_model));
    output.push_str(&format!("Base URL:         {}\n", status.base_url));
    output.push_str(&format!("Timeout:          {}s\n", status.timeout_seconds));
    CliResult::success(output)
}

async fn execute_models(orchestrator: &QueryOrchestrator) -> CliResult {
    let active = orchestrator.status_snapshot().await.active_model;

    match orchestrator.list_models().await {
        Ok(models) if models.is_empty() => CliResult::success("No models installed"),
        Ok(models) => {
            let lines: Vec<String> = models
                .iter()
                .map(|name| {
                    let marker = if name.contains(&active) { "*" } else { " " };
                    format!("{} {}", marker, name)
                })
                .collect();
            CliResult::success(lines.join("\n"))
        }
        Err(e) => CliResult::error(format!("Failed to list models: {}", e)),
    }
}

async fn execute_analyze_customer(orchestrator: &QueryOrchestrator, id: i64) -> CliResult {
    match orchestrator.load_customer(id).await {
        Ok(detail) if detail.customer.is_some() => {
            render_answer(orchestrator.analyze_customer(&detail).await, false)
        }
        Ok(_) => CliResult::error(format!("Customer {} not found", id)),
        Err(e) => CliResult::error(format!("Failed to load customer {}: {}", id, e)),
    }
}

async fn execute_suggest_products(orchestrator: &QueryOrchestrator, id: i64) -> CliResult {
    match orchestrator.load_customer(id).await {
        Ok(detail) if detail.customer.is_some() => {
            render_answer(orchestrator.suggest_products(&detail).await, false)
        }
        Ok(_) => CliResult::error(format!("Customer {} not found", id)),
        Err(e) => CliResult::error(format!("Failed to load customer {}: {}", id, e)),
    }
}

fn render_answer(outcome: Result<AnswerResult, Cancelled>, json: bool) -> CliResult {
    let result = match outcome {
        Ok(result) => result,
        Err(Cancelled) => return CliResult::error(CANCELLED_MESSAGE),
    };

    if json {
        return match serde_json::to_string_pretty(&result) {
            Ok(body) => CliResult::success(body),
            Err(e) => CliResult::error(format!("Failed to serialize answer: {}", e)),
        };
    }

    let mut output = result.answer.clone();
    output.push_str(&format!("\n\n[{}]", result.source.as_str()));
    if let Some(diagnostic) = &result.diagnostic {
        output.push_str(&format!(" {}", diagnostic));
    }
    CliResult::success(output)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
