//! The flow pipeline behind the HTTP endpoints.

use flowsmith_generation::{GeneratedFlow, GenerationRequest, GenerationService};
use flowsmith_repair::{FixRecord, KnownFix, RefineOutcome, RepairEngine};
use flowsmith_types::{FlowDocument, FlowsmithError, FlowsmithResult, NodeId, ValidationError};
use flowsmith_validator::{PublishReceipt, ValidationReport, ValidatorClient};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Outcome of a validate/refine loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergeReport {
    pub document: FlowDocument,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Repair rounds run.
    pub iterations: u32,
    /// Errors from the last validation; empty when accepted.
    pub errors: Vec<ValidationError>,
    pub fixes_made: Vec<FixRecord>,
    pub still_broken: Vec<NodeId>,
}

/// Generation, repair, validation and publishing behind one handle.
///
/// Stateless between requests: every call carries the document and
/// whatever the previous round returned.
pub struct FlowService {
    generation: Option<GenerationService>,
    repair: Option<RepairEngine>,
    validator: ValidatorClient,
    max_iterations: u32,
}

impl FlowService {
    pub fn new(validator: ValidatorClient) -> Self {
        Self {
            generation: None,
            repair: None,
            validator,
            max_iterations: 3,
        }
    }

    pub fn with_generation(mut self, generation: GenerationService) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn with_repair(mut self, repair: RepairEngine) -> Self {
        self.repair = Some(repair);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn generation_enabled(&self) -> bool {
        self.generation.is_some()
    }

    pub fn repair_enabled(&self) -> bool {
        self.repair.is_some()
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub async fn generate(&self, request: &GenerationRequest) -> FlowsmithResult<GeneratedFlow> {
        let generation = self
            .generation
            .as_ref()
            .ok_or_else(|| FlowsmithError::Config("generation backend is not configured".into()))?;
        generation.generate(request).await
    }

    pub async fn refine(
        &self,
        document: &FlowDocument,
        errors: &[ValidationError],
        iteration: u32,
        known_fixes: &[KnownFix],
    ) -> FlowsmithResult<RefineOutcome> {
        let repair = self
            .repair
            .as_ref()
            .ok_or_else(|| FlowsmithError::Config("repair backend is not configured".into()))?;
        repair.refine(document, errors, iteration, known_fixes).await
    }

    pub async fn validate(
        &self,
        document: &FlowDocument,
        artifact_id: &str,
        version: Option<&str>,
    ) -> FlowsmithResult<ValidationReport> {
        self.validator.validate(document, artifact_id, version).await
    }

    pub async fn publish(
        &self,
        document: &FlowDocument,
        artifact_id: &str,
        version: Option<&str>,
        environment: Option<&str>,
    ) -> FlowsmithResult<PublishReceipt> {
        self.validator
            .publish(document, artifact_id, version, environment)
            .await
    }

    /// Validate and repair until the validator accepts, the iteration
    /// budget runs out, or a repair round changes nothing.
    #[instrument(skip(self, document, known_fixes), fields(rows = document.len()))]
    pub async fn converge(
        &self,
        document: FlowDocument,
        artifact_id: &str,
        version: Option<&str>,
        known_fixes: &[KnownFix],
        max_iterations: Option<u32>,
    ) -> FlowsmithResult<ConvergeReport> {
        let budget = max_iterations.map_or(self.max_iterations, |requested| {
            requested.min(self.max_iterations)
        });
        let mut document = document;
        let mut version = version.map(str::to_string);
        let mut fixes_made = Vec::new();
        let mut still_broken = Vec::new();
        let mut iterations = 0;

        loop {
            let report = self.validate(&document, artifact_id, version.as_deref()).await?;
            version = Some(report.version_id.clone());

            if report.accepted {
                info!(artifact_id, iterations, version = %report.version_id, "Document accepted");
                return Ok(ConvergeReport {
                    document,
                    accepted: true,
                    version_id: version,
                    iterations,
                    errors: Vec::new(),
                    fixes_made,
                    still_broken: Vec::new(),
                });
            }

            if iterations >= budget {
                warn!(artifact_id, iterations, errors = report.errors.len(), "Iteration budget exhausted");
                return Ok(ConvergeReport {
                    document,
                    accepted: false,
                    version_id: version,
                    iterations,
                    errors: report.errors,
                    fixes_made,
                    still_broken,
                });
            }

            iterations += 1;
            let outcome = self
                .refine(&document, &report.errors, iterations, known_fixes)
                .await?;
            still_broken = outcome.still_broken;

            if outcome.fixes_made.is_empty() {
                warn!(artifact_id, iterations, "Repair round changed nothing, stopping");
                return Ok(ConvergeReport {
                    document,
                    accepted: false,
                    version_id: version,
                    iterations,
                    errors: report.errors,
                    fixes_made,
                    still_broken,
                });
            }

            fixes_made.extend(outcome.fixes_made);
            document = outcome.document;
        }
    }
}
