//! In-memory artifact store
//!
//! Suitable for development and testing. Versions can be locked by hand or
//! sealed on deploy, and submissions are checked with local structural
//! rules (or a caller-supplied checker) instead of the remote compiler.

use crate::error::{StoreError, StoreResult};
use crate::outcome::SubmissionOutcome;
use crate::store::ArtifactStore;
use async_trait::async_trait;
use dashmap::DashMap;
use flowsmith_types::{ArtifactVersion, Column, FlowDocument, FlowsmithError, NodeKind, ValidationError};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Content checker applied to every submission.
pub type DocumentChecker = Arc<dyn Fn(&str) -> Vec<ValidationError> + Send + Sync>;

#[derive(Debug, Clone)]
struct StoredVersion {
    tag: String,
    locked: bool,
    accepted: Option<String>,
}

/// In-memory artifact store
pub struct InMemoryArtifactStore {
    artifacts: DashMap<String, Vec<StoredVersion>>,
    checker: DocumentChecker,
    seal_on_deploy: bool,
    version_creates: AtomicU64,
    submissions: AtomicU64,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            artifacts: DashMap::new(),
            checker: Arc::new(check_structure),
            seal_on_deploy: true,
            version_creates: AtomicU64::new(0),
            submissions: AtomicU64::new(0),
        }
    }

    /// Replace the structural checker.
    pub fn with_checker(mut self, checker: DocumentChecker) -> Self {
        self.checker = checker;
        self
    }

    /// Keep deployed versions writable.
    pub fn without_seal_on_deploy(mut self) -> Self {
        self.seal_on_deploy = false;
        self
    }

    /// Seed an artifact with versions `(tag, locked)`.
    pub fn seed(&self, artifact_id: &str, versions: &[(&str, bool)]) {
        self.artifacts.insert(
            artifact_id.to_string(),
            versions
                .iter()
                .map(|(tag, locked)| StoredVersion {
                    tag: tag.to_string(),
                    locked: *locked,
                    accepted: None,
                })
                .collect(),
        );
    }

    /// Lock a version. Returns `false` when it does not exist.
    pub fn lock_version(&self, artifact_id: &str, tag: &str) -> bool {
        self.artifacts
            .get_mut(artifact_id)
            .and_then(|mut versions| {
                versions
                    .iter_mut()
                    .find(|version| version.tag == tag)
                    .map(|version| version.locked = true)
            })
            .is_some()
    }

    /// Last document accepted by a version.
    pub fn accepted_document(&self, artifact_id: &str, tag: &str) -> Option<String> {
        self.artifacts.get(artifact_id).and_then(|versions| {
            versions
                .iter()
                .find(|version| version.tag == tag)
                .and_then(|version| version.accepted.clone())
        })
    }

    pub fn has_artifact(&self, artifact_id: &str) -> bool {
        self.artifacts.contains_key(artifact_id)
    }

    /// Number of `create_version` calls received, successful or not.
    pub fn version_create_count(&self) -> u64 {
        self.version_creates.load(Ordering::Relaxed)
    }

    /// Number of `submit` calls received.
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn list_versions(&self, artifact_id: &str) -> StoreResult<Vec<ArtifactVersion>> {
        let versions = self
            .artifacts
            .get(artifact_id)
            .ok_or_else(|| StoreError::ArtifactMissing(artifact_id.to_string()))?;

        Ok(versions
            .iter()
            .map(|version| ArtifactVersion {
                locked: version.locked,
                ..ArtifactVersion::new(artifact_id, version.tag.as_str())
            })
            .collect())
    }

    async fn create_artifact(&self, artifact_id: &str) -> StoreResult<()> {
        self.artifacts.entry(artifact_id.to_string()).or_default();
        Ok(())
    }

    async fn create_version(&self, artifact_id: &str, tag: &str) -> StoreResult<ArtifactVersion> {
        self.version_creates.fetch_add(1, Ordering::Relaxed);
        let mut versions = self
            .artifacts
            .get_mut(artifact_id)
            .ok_or_else(|| StoreError::ArtifactMissing(artifact_id.to_string()))?;

        if !versions.iter().any(|version| version.tag == tag) {
            versions.push(StoredVersion {
                tag: tag.to_string(),
                locked: false,
                accepted: None,
            });
        }
        Ok(ArtifactVersion::new(artifact_id, tag))
    }

    async fn submit(
        &self,
        artifact_id: &str,
        tag: &str,
        document: &str,
    ) -> StoreResult<SubmissionOutcome> {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        let mut versions = self
            .artifacts
            .get_mut(artifact_id)
            .ok_or_else(|| StoreError::ArtifactMissing(artifact_id.to_string()))?;
        let version = versions
            .iter_mut()
            .find(|version| version.tag == tag)
            .ok_or_else(|| StoreError::VersionMissing {
                artifact_id: artifact_id.to_string(),
                version: tag.to_string(),
            })?;

        if version.locked {
            return Ok(SubmissionOutcome::VersionLocked {
                message: format!("version {} of {} is locked", tag, artifact_id),
            });
        }

        let errors = (self.checker)(document);
        debug!(artifact_id, version = tag, errors = errors.len(), "Checked submission");
        if errors.is_empty() {
            version.accepted = Some(document.to_string());
            Ok(SubmissionOutcome::Accepted)
        } else {
            Ok(SubmissionOutcome::ContentErrors { errors })
        }
    }

    async fn deploy(
        &self,
        artifact_id: &str,
        tag: &str,
        environment: &str,
    ) -> StoreResult<Option<String>> {
        let mut versions = self
            .artifacts
            .get_mut(artifact_id)
            .ok_or_else(|| StoreError::ArtifactMissing(artifact_id.to_string()))?;
        let version = versions
            .iter_mut()
            .find(|version| version.tag == tag)
            .ok_or_else(|| StoreError::VersionMissing {
                artifact_id: artifact_id.to_string(),
                version: tag.to_string(),
            })?;

        if version.accepted.is_none() {
            return Err(FlowsmithError::remote(
                Some(409),
                format!("version {} has no accepted document", tag),
            )
            .into());
        }
        if self.seal_on_deploy {
            version.locked = true;
        }
        Ok(Some(format!("memory://{}/{}/{}", artifact_id, tag, environment)))
    }
}

/// Local structural rules: schema shape, node types, action commands,
/// unique identifiers and resolvable routes.
pub fn check_structure(text: &str) -> Vec<ValidationError> {
    let document = match FlowDocument::parse(text) {
        Ok(document) => document,
        Err(err) => return vec![ValidationError::general("schema", err.to_string())],
    };

    let mut errors = Vec::new();
    for (position, row) in document.rows().iter().enumerate() {
        let Some(id) = row.node_id() else {
            errors.push(ValidationError::general(
                "schema",
                format!("row {} has no numeric Node Number", position + 1),
            ));
            continue;
        };

        match row.field(Column::NodeType).and_then(NodeKind::parse) {
            None => errors.push(ValidationError::new(
                Some(id),
                "schema",
                Column::NodeType.header(),
                "expected D or A",
            )),
            Some(NodeKind::Action)
                if row.field(Column::Command).map_or(true, |command| command.trim().is_empty()) =>
            {
                errors.push(ValidationError::new(
                    Some(id),
                    "content",
                    Column::Command.header(),
                    "action node has no command",
                ))
            }
            Some(_) => {}
        }
    }

    for id in document.duplicate_ids() {
        errors.push(ValidationError::new(
            Some(id),
            "identity",
            Column::NodeNumber.header(),
            "node number is used more than once",
        ));
    }

    let mut reported = BTreeSet::new();
    for (source, target) in document.dangling_references() {
        if reported.insert((source, target)) {
            errors.push(ValidationError::new(
                Some(source),
                "routing",
                Column::NextNodes.header(),
                format!("target {} does not exist", target),
            ));
        }
    }

    errors
}
