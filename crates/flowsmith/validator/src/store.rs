//! The artifact store seam.

use crate::error::StoreResult;
use crate::outcome::SubmissionOutcome;
use async_trait::async_trait;
use flowsmith_types::ArtifactVersion;

/// Versioned remote storage that compiles and validates flow documents.
///
/// The store is the sole owner of version history; nothing here caches it
/// between requests.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// All versions of `artifact_id`, in whatever order the store keeps them.
    /// Fails with `ArtifactMissing` when the artifact does not exist.
    async fn list_versions(&self, artifact_id: &str) -> StoreResult<Vec<ArtifactVersion>>;

    /// Create the parent artifact.
    async fn create_artifact(&self, artifact_id: &str) -> StoreResult<()>;

    /// Create version `tag`. Fails with `ArtifactMissing` when the parent
    /// does not exist.
    async fn create_version(&self, artifact_id: &str, tag: &str) -> StoreResult<ArtifactVersion>;

    /// Submit canonical document text to one version.
    async fn submit(
        &self,
        artifact_id: &str,
        tag: &str,
        document: &str,
    ) -> StoreResult<SubmissionOutcome>;

    /// Deploy an accepted version; returns a preview locator when the
    /// store provides one.
    async fn deploy(
        &self,
        artifact_id: &str,
        tag: &str,
        environment: &str,
    ) -> StoreResult<Option<String>>;
}
