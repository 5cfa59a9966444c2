//! Flow pipeline handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::service::ConvergeReport;
use axum::{extract::State, Json};
use flowsmith_generation::{GeneratedFlow, GenerationRequest};
use flowsmith_repair::{KnownFix, RefineOutcome};
use flowsmith_types::{normalize_errors, FlowDocument, FlowsmithError};
use flowsmith_validator::{PublishReceipt, ValidationReport};
use serde::Deserialize;
use serde_json::Value;

/// Refine request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    pub document: String,
    /// Validator errors in any of the accepted shapes
    #[serde(default)]
    pub errors: Value,
    #[serde(default = "default_iteration")]
    pub iteration: u32,
    #[serde(default)]
    pub known_fixes: Vec<KnownFix>,
}

fn default_iteration() -> u32 {
    1
}

/// Validate request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub document: String,
    pub artifact_id: String,
    #[serde(default)]
    pub version_id: Option<String>,
}

/// Publish request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub document: String,
    pub artifact_id: String,
    #[serde(default)]
    pub version_id: Option<String>,
    /// Deploy to this environment after validation succeeds
    #[serde(default)]
    pub environment: Option<String>,
}

/// Converge request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergeRequest {
    pub document: String,
    pub artifact_id: String,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub known_fixes: Vec<KnownFix>,
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

fn parse_document(text: &str) -> ApiResult<FlowDocument> {
    FlowDocument::parse(text).map_err(|err| ApiError::Flow(FlowsmithError::from(err)))
}

fn require_artifact(artifact_id: &str) -> ApiResult<()> {
    if artifact_id.trim().is_empty() {
        return Err(ApiError::BadRequest("artifactId must not be empty".into()));
    }
    Ok(())
}

/// Generate a flow document
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> ApiResult<Json<GeneratedFlow>> {
    let generated = state.flows.generate(&req).await?;
    Ok(Json(generated))
}

/// Run one repair round over a rejected document
pub async fn refine(
    State(state): State<AppState>,
    Json(req): Json<RefineRequest>,
) -> ApiResult<Json<RefineOutcome>> {
    let document = parse_document(&req.document)?;
    let errors = normalize_errors(&req.errors).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let outcome = state
        .flows
        .refine(&document, &errors, req.iteration, &req.known_fixes)
        .await?;
    Ok(Json(outcome))
}

/// Submit a document to the validator
pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<Json<ValidationReport>> {
    require_artifact(&req.artifact_id)?;
    let document = parse_document(&req.document)?;

    let report = state
        .flows
        .validate(&document, &req.artifact_id, req.version_id.as_deref())
        .await?;
    Ok(Json(report))
}

/// Validate and optionally deploy a document
pub async fn publish(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> ApiResult<Json<PublishReceipt>> {
    require_artifact(&req.artifact_id)?;
    let document = parse_document(&req.document)?;

    let receipt = state
        .flows
        .publish(
            &document,
            &req.artifact_id,
            req.version_id.as_deref(),
            req.environment.as_deref(),
        )
        .await?;
    Ok(Json(receipt))
}

/// Validate and repair until accepted or out of rounds
pub async fn converge(
    State(state): State<AppState>,
    Json(req): Json<ConvergeRequest>,
) -> ApiResult<Json<ConvergeReport>> {
    require_artifact(&req.artifact_id)?;
    let document = parse_document(&req.document)?;

    let report = state
        .flows
        .converge(
            document,
            &req.artifact_id,
            req.version_id.as_deref(),
            &req.known_fixes,
            req.max_iterations,
        )
        .await?;
    Ok(Json(report))
}
