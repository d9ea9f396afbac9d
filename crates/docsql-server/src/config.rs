//! Configuration system for the docsql server
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (port, timeouts, seed data, logging)
//! 2. .env file - local overrides
//!
//! Environment variables always override config.yaml values.

use docsql_exec::ExecutionOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnvVar { name: String, value: String },
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Statement execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Bound on every search engine round-trip, in seconds
    pub query_timeout_secs: u64,

    /// Maximum documents fetched per query
    pub max_page_size: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let defaults = ExecutionOptions::default();
        Self {
            query_timeout_secs: defaults.timeout.as_secs(),
            max_page_size: defaults.max_page_size,
        }
    }
}

impl ExecutionConfig {
    pub fn options(&self) -> ExecutionOptions {
        ExecutionOptions {
            timeout: Duration::from_secs(self.query_timeout_secs),
            max_page_size: self.max_page_size,
        }
    }
}

/// In-memory search engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// JSON file of `{ "collection": [documents] }` loaded at startup
    #[serde(default)]
    pub seed_path: Option<String>,

    /// Simulated round-trip latency in milliseconds
    #[serde(default)]
    pub simulated_latency_ms: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults with environment variable overrides, for running without a file
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("DOCSQL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parsed_env("DOCSQL_SERVER_PORT")? {
            self.server.port = port;
        }

        if let Some(secs) = parsed_env("DOCSQL_QUERY_TIMEOUT_SECS")? {
            self.execution.query_timeout_secs = secs;
        }
        if let Some(size) = parsed_env("DOCSQL_MAX_PAGE_SIZE")? {
            self.execution.max_page_size = size;
        }

        if let Ok(path) = std::env::var("DOCSQL_SEED_PATH") {
            self.gateway.seed_path = Some(path);
        }
        if let Some(ms) = parsed_env("DOCSQL_SIMULATED_LATENCY_MS")? {
            self.gateway.simulated_latency_ms = Some(ms);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }

        Ok(())
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
