use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bizdesk_assistant::{
    cli::{execute_command, Cli},
    config::{Config, LogFormat},
    inference::OllamaClient,
    orchestrator::QueryOrchestrator,
    storage::SqliteAggregates,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.ollama.model,
        "BizDesk assistant starting..."
    );

    // Initialize storage
    let store = match SqliteAggregates::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    // Initialize Ollama client
    let backend = match OllamaClient::new(&config.ollama) {
        Ok(c) => {
            info!(base_url = %config.ollama.base_url, "Ollama client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Ollama client");
            return Err(e.into());
        }
    };

    let orchestrator = match QueryOrchestrator::new(&config, Arc::new(backend), Arc::new(store)) {
        Ok(o) => o,
        Err(e) => {
            error!(error = %e, "Failed to initialize query orchestrator");
            return Err(e.into());
        }
    };

    let result = execute_command(cli.command, &orchestrator).await;
    orchestrator.shutdown();

    if result.exit_code == 0 {
        println!("{}", result.message);
    } else {
        eprintln!("{}", result.message);
        std::process::exit(result.exit_code);
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
