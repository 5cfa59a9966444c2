//! Health handler

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub validator: String,
    pub generation_enabled: bool,
    pub repair_enabled: bool,
    pub max_iterations: u32,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        validator: state.validator_backend.clone(),
        generation_enabled: state.flows.generation_enabled(),
        repair_enabled: state.flows.repair_enabled(),
        max_iterations: state.flows.max_iterations(),
    })
}
