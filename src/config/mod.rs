use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub generation: GenerationConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub context: ContextConfig,
    pub reconnect: ReconnectConfig,
}

/// Inference service (Ollama) configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    /// Timeout for real generation requests
    pub timeout_ms: u64,
    /// Timeout for the model listing used as reachability check
    pub reachability_timeout_ms: u64,
    /// Timeout for the tiny verification prompt
    pub probe_timeout_ms: u64,
}

/// Sampling parameters sent in the `options` object of a generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub num_predict: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Prompt context shaping
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Upper bound, in characters, of the rendered prompt context
    pub max_chars: usize,
    pub recent_customers: u32,
    pub recent_orders: u32,
    pub top_products: u32,
    pub currency_symbol: String,
}

/// When a failed inference call schedules a background reconnection probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Probe after every inference failure except cancellation
    Always,
    /// Probe only after network, timeout and protocol failures
    TransportOnly,
    /// Never probe in the background
    Never,
}

impl FromStr for ReconnectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(ReconnectPolicy::Always),
            "transport" | "transport_only" => Ok(ReconnectPolicy::TransportOnly),
            "never" | "off" => Ok(ReconnectPolicy::Never),
            _ => Err(format!("Unknown reconnect policy: {}", s)),
        }
    }
}

/// Background reconnection configuration
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub policy: ReconnectPolicy,
    pub delay_ms: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = OllamaConfig::default();
        let ollama = OllamaConfig {
            base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or(defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            model: env::var("OLLAMA_MODEL").unwrap_or(defaults.model),
            timeout_ms: env_or("OLLAMA_TIMEOUT_MS", defaults.timeout_ms),
            reachability_timeout_ms: env_or(
                "OLLAMA_REACHABILITY_TIMEOUT_MS",
                defaults.reachability_timeout_ms,
            ),
            probe_timeout_ms: env_or("OLLAMA_PROBE_TIMEOUT_MS", defaults.probe_timeout_ms),
        };

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            num_predict: env_or("GEN_NUM_PREDICT", defaults.num_predict),
            temperature: env_or("GEN_TEMPERATURE", defaults.temperature),
            top_k: env_or("GEN_TOP_K", defaults.top_k),
            top_p: env_or("GEN_TOP_P", defaults.top_p),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/business.db".to_string()),
            ),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = ContextConfig::default();
        let context = ContextConfig {
            max_chars: env_or("CONTEXT_MAX_CHARS", defaults.max_chars),
            recent_customers: env_or("CONTEXT_RECENT_CUSTOMERS", defaults.recent_customers),
            recent_orders: env_or("CONTEXT_RECENT_ORDERS", defaults.recent_orders),
            top_products: env_or("CONTEXT_TOP_PRODUCTS", defaults.top_products),
            currency_symbol: env::var("CURRENCY_SYMBOL").unwrap_or(defaults.currency_symbol),
        };

        let reconnect = ReconnectConfig {
            policy: match env::var("RECONNECT_POLICY") {
                Ok(raw) => raw.parse().map_err(|message| AppError::Config { message })?,
                Err(_) => ReconnectPolicy::Always,
            },
            delay_ms: env_or("RECONNECT_DELAY_MS", 2000),
        };

        let config = Config {
            ollama,
            generation,
            database,
            logging,
            context,
            reconnect,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the core cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        self.ollama.validate()?;

        if self.context.max_chars == 0 {
            return Err(AppError::Config {
                message: "CONTEXT_MAX_CHARS must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl OllamaConfig {
    /// Validate base URL, model id and timeouts.
    pub fn validate(&self) -> AppResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(AppError::Config {
                message: "OLLAMA_BASE_URL cannot be empty".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Config {
                message: format!("OLLAMA_BASE_URL must start with http:// or https://: {}", url),
            });
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Config {
                message: "OLLAMA_MODEL cannot be empty".to_string(),
            });
        }
        if self.timeout_ms == 0 || self.reachability_timeout_ms == 0 || self.probe_timeout_ms == 0
        {
            return Err(AppError::Config {
                message: "Ollama timeouts must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:0.5b".to_string(),
            timeout_ms: 15000,
            reachability_timeout_ms: 5000,
            probe_timeout_ms: 8000,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_predict: 250,
            temperature: 0.4,
            top_k: 30,
            top_p: 0.8,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: 600,
            recent_customers: 3,
            recent_orders: 3,
            top_products: 4,
            currency_symbol: "R$".to_string(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::Always,
            delay_ms: 2000,
        }
    }
}
