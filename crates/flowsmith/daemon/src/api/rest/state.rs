//! Application state for API handlers

use crate::config::{DaemonConfig, ValidatorConfig};
use crate::error::DaemonResult;
use crate::service::FlowService;
use chrono::{DateTime, Utc};
use flowsmith_generation::{GenerationService, LlmClient};
use flowsmith_repair::RepairEngine;
use flowsmith_validator::{ArtifactStore, HttpArtifactStore, InMemoryArtifactStore, ValidatorClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Flow pipeline
    pub flows: Arc<FlowService>,

    /// Validator backend name, for health reporting
    pub validator_backend: String,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(flows: Arc<FlowService>, validator_backend: impl Into<String>) -> Self {
        Self {
            flows,
            validator_backend: validator_backend.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// Build every component named by `config`.
    pub fn from_config(config: &DaemonConfig) -> DaemonResult<Self> {
        let (store, backend): (Arc<dyn ArtifactStore>, &str) = match &config.validator {
            ValidatorConfig::Memory => {
                let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
                (store, "memory")
            }
            ValidatorConfig::Http {
                base_url,
                api_token_env,
                timeout_secs,
            } => {
                let token = std::env::var(api_token_env).ok().filter(|token| !token.is_empty());
                if token.is_none() {
                    warn!(env = %api_token_env, "No validator token set, calling without credentials");
                }
                let store = HttpArtifactStore::new(
                    base_url,
                    token,
                    Duration::from_secs(*timeout_secs),
                    config.retry.policy(),
                )
                .map_err(flowsmith_types::FlowsmithError::from)?;
                let store: Arc<dyn ArtifactStore> = Arc::new(store);
                (store, "http")
            }
        };

        let mut flows = FlowService::new(ValidatorClient::new(store))
            .with_max_iterations(config.repair.max_iterations);

        if config.generation.enabled {
            match LlmClient::new(config.generation.model_config()) {
                Ok(client) => {
                    let client = Arc::new(client);
                    info!(
                        kind = ?config.generation.kind,
                        model = %config.generation.model,
                        "Generation backend configured"
                    );
                    flows = flows
                        .with_generation(GenerationService::new(client.clone()))
                        .with_repair(
                            RepairEngine::new(client)
                                .with_threshold(config.repair.row_level_threshold),
                        );
                }
                Err(err) => {
                    warn!(error = %err, "Generation backend unavailable; generate and refine are disabled")
                }
            }
        }

        Ok(Self::new(Arc::new(flows), backend))
    }

    /// Uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        let secs = elapsed.num_seconds().max(0);
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
