//! Artifact store errors

use flowsmith_types::FlowsmithError;
use thiserror::Error;

/// Errors raised by an [`ArtifactStore`](crate::ArtifactStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The parent artifact does not exist yet
    #[error("artifact not found: {0}")]
    ArtifactMissing(String),

    /// The named version does not exist
    #[error("version not found: {artifact_id}@{version}")]
    VersionMissing { artifact_id: String, version: String },

    /// Any other failure, already classified
    #[error(transparent)]
    Remote(#[from] FlowsmithError),
}

impl StoreError {
    /// Whether probing further versions is pointless after this error.
    pub fn aborts_probing(&self) -> bool {
        matches!(
            self,
            StoreError::Remote(FlowsmithError::Auth(_))
                | StoreError::Remote(FlowsmithError::RateLimited { .. })
        )
    }
}

impl From<StoreError> for FlowsmithError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Remote(inner) => inner,
            other => FlowsmithError::remote(Some(404), other.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        StoreError::Remote(FlowsmithError::Network(reason))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_converges_to_remote_not_found() {
        let err: FlowsmithError = StoreError::ArtifactMissing("support-bot".into()).into();
        assert!(matches!(err, FlowsmithError::Remote { status: Some(404), .. }));
    }

    #[test]
    fn test_probing_aborts_on_auth_and_rate_limit_only() {
        assert!(StoreError::Remote(FlowsmithError::Auth("bad token".into())).aborts_probing());
        assert!(StoreError::Remote(FlowsmithError::RateLimited { retry_after_secs: 3 }).aborts_probing());
        assert!(!StoreError::Remote(FlowsmithError::Network("reset".into())).aborts_probing());
        assert!(!StoreError::ArtifactMissing("a".into()).aborts_probing());
    }
}
