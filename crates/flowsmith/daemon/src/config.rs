//! Configuration for flowsmith-daemon
//!
//! Layered as defaults, then an optional file, then `FLOWSMITH_*`
//! environment variables (`__` separates nested keys, for example
//! `FLOWSMITH_REPAIR__MAX_ITERATIONS=5`). Secrets are never stored here;
//! the config names the environment variable that holds them.

use flowsmith_generation::{BackendKind, ModelConfig};
use flowsmith_repair::DEFAULT_ROW_LEVEL_THRESHOLD;
use flowsmith_resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote validator backend
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Generation and repair model backend
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Repair loop settings
    #[serde(default)]
    pub repair: RepairConfig,

    /// Retry settings for idempotent reads
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Validator backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValidatorConfig {
    /// In-memory store with local structural checks (development/testing)
    #[default]
    Memory,

    /// Remote validator REST API
    Http {
        /// Base URL of the validator service
        base_url: String,

        /// Environment variable holding the API token
        #[serde(default = "default_validator_token_env")]
        api_token_env: String,

        /// Per-request timeout in seconds
        #[serde(default = "default_validator_timeout")]
        timeout_secs: u64,
    },
}

/// Generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Disable to run validation and publishing only
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Wire protocol of the backend
    #[serde(default)]
    pub kind: BackendKind,

    /// Endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_model_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: BackendKind::default(),
            endpoint: None,
            model: default_model(),
            api_key_env: default_model_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    /// Model settings, with the API key read from the environment.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            kind: self.kind,
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: std::env::var(&self.api_key_env).ok().filter(|key| !key.is_empty()),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Repair loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Validate/refine rounds allowed per converge request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Largest broken-row ratio repaired row by row
    #[serde(default = "default_row_level_threshold")]
    pub row_level_threshold: f64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            row_level_threshold: default_row_level_threshold(),
        }
    }
}

/// Retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_request_timeout() -> u64 {
    300
}

fn default_max_body_size() -> usize {
    4 * 1024 * 1024
}

fn default_validator_token_env() -> String {
    "FLOWSMITH_VALIDATOR_TOKEN".to_string()
}

fn default_validator_timeout() -> u64 {
    30
}

fn default_model() -> String {
    ModelConfig::default().model
}

fn default_model_key_env() -> String {
    "FLOWSMITH_MODEL_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_max_iterations() -> u32 {
    3
}

fn default_row_level_threshold() -> f64 {
    DEFAULT_ROW_LEVEL_THRESHOLD
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with FLOWSMITH_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("FLOWSMITH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(matches!(config.validator, ValidatorConfig::Memory));
        assert_eq!(config.repair.max_iterations, 3);
        assert_eq!(config.repair.row_level_threshold, 0.5);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryConfig {
            max_attempts: 0,
            base_delay_ms: 50,
            max_delay_ms: 400,
        }
        .policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_http_validator_section() {
        let config: DaemonConfig = serde_json::from_value(serde_json::json!({
            "validator": {"type": "http", "base_url": "https://validator.example"},
            "generation": {"kind": "anthropic", "model": "claude-sonnet"}
        }))
        .unwrap();

        match config.validator {
            ValidatorConfig::Http { base_url, api_token_env, timeout_secs } => {
                assert_eq!(base_url, "https://validator.example");
                assert_eq!(api_token_env, "FLOWSMITH_VALIDATOR_TOKEN");
                assert_eq!(timeout_secs, 30);
            }
            other => panic!("expected http validator, got {:?}", other),
        }
        assert_eq!(config.generation.kind, BackendKind::Anthropic);
        assert_eq!(config.server.request_timeout_secs, 300);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.generation.max_tokens, 4096);
        assert!(config.generation.enabled);
    }
}
