//! Version lifecycle: finding a version that still accepts writes.
//!
//! Any version can become locked between two requests, so the manager never
//! trusts a remembered tag. It checks existing versions from the newest
//! down and, when all of them refuse writes, creates the next one.

use crate::error::StoreError;
use crate::outcome::SubmissionOutcome;
use crate::store::ArtifactStore;
use flowsmith_types::{
    next_version, sort_descending, ArtifactVersion, FlowsmithError, FlowsmithResult, INITIAL_VERSION,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A submission that reached a writable version.
///
/// `outcome` is never `VersionLocked`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub version: String,
    pub outcome: SubmissionOutcome,
}

/// Version lifecycle manager
#[derive(Clone)]
pub struct VersionManager {
    store: Arc<dyn ArtifactStore>,
}

impl VersionManager {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Versions of `artifact_id`; empty when the artifact does not exist.
    pub async fn versions(&self, artifact_id: &str) -> FlowsmithResult<Vec<ArtifactVersion>> {
        match self.store.list_versions(artifact_id).await {
            Ok(versions) => Ok(versions),
            Err(StoreError::ArtifactMissing(_)) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Create version `tag`, creating the parent artifact first when the
    /// store reports it missing. The version-create call is retried exactly
    /// once.
    #[instrument(skip(self))]
    pub async fn ensure_artifact(&self, artifact_id: &str, tag: &str) -> FlowsmithResult<ArtifactVersion> {
        match self.store.create_version(artifact_id, tag).await {
            Ok(version) => Ok(version),
            Err(StoreError::ArtifactMissing(_)) => {
                info!(artifact_id, "Artifact missing, creating it");
                self.store.create_artifact(artifact_id).await?;
                Ok(self.store.create_version(artifact_id, tag).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Submit `document` to the newest version that accepts writes.
    ///
    /// Versions are tried newest first, skipping `last_known_locked` and
    /// any the store already flags as locked. Content errors stop probing
    /// and are returned as the submission's outcome. Authentication and
    /// rate-limit failures abort; any other failure on one candidate moves
    /// on to the next. When no candidate accepts writes, the next version
    /// is created and receives one final submission.
    #[instrument(skip(self, document))]
    pub async fn resolve_writable_version(
        &self,
        artifact_id: &str,
        document: &str,
        last_known_locked: Option<&str>,
    ) -> FlowsmithResult<Submission> {
        let versions = self.versions(artifact_id).await?;
        let all_tags: Vec<&str> = versions.iter().map(|version| version.tag.as_str()).collect();

        let mut candidates: Vec<&str> = versions
            .iter()
            .filter(|version| {
                if Some(version.tag.as_str()) == last_known_locked {
                    return false;
                }
                if version.locked {
                    debug!(artifact_id, version = %version.tag, "Skipping version flagged as locked");
                    return false;
                }
                true
            })
            .map(|version| version.tag.as_str())
            .collect();
        sort_descending(&mut candidates);

        for tag in candidates {
            match self.store.submit(artifact_id, tag, document).await {
                Ok(SubmissionOutcome::VersionLocked { message }) => {
                    info!(artifact_id, version = tag, message = %message, "Version is locked, probing next");
                }
                Ok(outcome) => {
                    return Ok(Submission {
                        version: tag.to_string(),
                        outcome,
                    })
                }
                Err(err) if err.aborts_probing() => return Err(err.into()),
                Err(err) => {
                    warn!(artifact_id, version = tag, error = %err, "Version check failed, trying next");
                }
            }
        }

        let tag = if all_tags.is_empty() {
            INITIAL_VERSION.to_string()
        } else {
            next_version(&all_tags)
        };
        info!(artifact_id, version = %tag, "No writable version, creating one");
        self.ensure_artifact(artifact_id, &tag).await?;

        match self.store.submit(artifact_id, &tag, document).await? {
            SubmissionOutcome::VersionLocked { message } => Err(FlowsmithError::VersionLocked {
                artifact_id: artifact_id.to_string(),
                version: tag,
                message,
            }),
            outcome => Ok(Submission {
                version: tag,
                outcome,
            }),
        }
    }
}
