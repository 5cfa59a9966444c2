//! Validator client: validate and publish flow documents.

use crate::error::StoreError;
use crate::manager::{Submission, VersionManager};
use crate::outcome::SubmissionOutcome;
use crate::store::ArtifactStore;
use flowsmith_types::{FlowDocument, FlowsmithError, FlowsmithResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Result of validating a document against the remote validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub accepted: bool,
    /// Version that received the submission.
    pub version_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
}

impl From<Submission> for ValidationReport {
    fn from(submission: Submission) -> Self {
        let errors = match submission.outcome {
            SubmissionOutcome::ContentErrors { errors } => errors,
            _ => Vec::new(),
        };
        Self {
            accepted: errors.is_empty(),
            version_id: submission.version,
            errors,
        }
    }
}

/// Result of a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub success: bool,
    pub version_id: String,
    pub deployed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_locator: Option<String>,
}

/// Submits canonical document text and routes each outcome: acceptance and
/// content errors back to the caller, locks to the version manager.
#[derive(Clone)]
pub struct ValidatorClient {
    versions: VersionManager,
}

impl ValidatorClient {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            versions: VersionManager::new(store),
        }
    }

    pub fn versions(&self) -> &VersionManager {
        &self.versions
    }

    /// Validate `document`, targeting `version` when given. A locked or
    /// missing target falls back to version resolution.
    #[instrument(skip(self, document), fields(rows = document.len()))]
    pub async fn validate(
        &self,
        document: &FlowDocument,
        artifact_id: &str,
        version: Option<&str>,
    ) -> FlowsmithResult<ValidationReport> {
        let text = document.to_text();
        let submission = match version {
            Some(tag) => match self.submit_to(artifact_id, tag, &text).await? {
                Some(submission) => submission,
                None => {
                    self.versions
                        .resolve_writable_version(artifact_id, &text, Some(tag))
                        .await?
                }
            },
            None => {
                self.versions
                    .resolve_writable_version(artifact_id, &text, None)
                    .await?
            }
        };

        let report = ValidationReport::from(submission);
        info!(
            artifact_id,
            version = %report.version_id,
            accepted = report.accepted,
            errors = report.errors.len(),
            "Validated document"
        );
        Ok(report)
    }

    /// Validate, then deploy to `environment` when one is given. Content
    /// errors fail the publish with `ContentValidation`.
    #[instrument(skip(self, document))]
    pub async fn publish(
        &self,
        document: &FlowDocument,
        artifact_id: &str,
        version: Option<&str>,
        environment: Option<&str>,
    ) -> FlowsmithResult<PublishReceipt> {
        let report = self.validate(document, artifact_id, version).await?;
        if !report.accepted {
            return Err(FlowsmithError::ContentValidation(report.errors));
        }

        let (deployed, preview_locator) = match environment {
            Some(environment) => {
                let preview = self
                    .versions
                    .store()
                    .deploy(artifact_id, &report.version_id, environment)
                    .await?;
                info!(artifact_id, version = %report.version_id, environment, "Published");
                (true, preview)
            }
            None => (false, None),
        };

        Ok(PublishReceipt {
            success: true,
            version_id: report.version_id,
            deployed,
            preview_locator,
        })
    }

    /// Submit to one named version; `None` when it is locked. A missing
    /// version is created first.
    async fn submit_to(
        &self,
        artifact_id: &str,
        tag: &str,
        text: &str,
    ) -> FlowsmithResult<Option<Submission>> {
        let store = self.versions.store();
        let outcome = match store.submit(artifact_id, tag, text).await {
            Ok(outcome) => outcome,
            Err(StoreError::ArtifactMissing(_)) | Err(StoreError::VersionMissing { .. }) => {
                self.versions.ensure_artifact(artifact_id, tag).await?;
                store.submit(artifact_id, tag, text).await?
            }
            Err(err) => return Err(err.into()),
        };

        Ok(match outcome {
            SubmissionOutcome::VersionLocked { message } => {
                info!(artifact_id, version = tag, message = %message, "Requested version is locked");
                None
            }
            outcome => Some(Submission {
                version: tag.to_string(),
                outcome,
            }),
        })
    }
}
