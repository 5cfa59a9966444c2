//! Error types shared across Flowsmith crates.

use crate::node::NodeId;
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Structural problems with canonical document text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No records at all
    #[error("document is empty")]
    Empty,

    /// First record is not the canonical header
    #[error("missing canonical header, found '{found}'")]
    MissingHeader { found: String },

    /// A data record with the wrong number of fields
    #[error("record {record} has {found} fields, expected {expected}")]
    FieldCount {
        record: usize,
        expected: usize,
        found: usize,
    },
}

/// Violations of node-list invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Two nodes share an identifier
    #[error("duplicate node identifier {0}")]
    DuplicateNodeId(NodeId),

    /// A route value or option label holds `|` or `~`
    #[error("node {node}: '{text}' contains a reserved separator (| or ~)")]
    ReservedSeparator { node: NodeId, text: String },
}

/// A validator error payload in no supported shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationShapeError {
    #[error("unrecognized validation error shape: {found}")]
    Unrecognized { found: String },
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ParseFailed,
    SchemaInvalid,
    ContentInvalid,
    VersionLocked,
    RateLimited,
    AuthFailed,
    Network,
    Remote,
    Config,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ParseFailed => "PARSE_FAILED",
            ErrorKind::SchemaInvalid => "SCHEMA_INVALID",
            ErrorKind::ContentInvalid => "CONTENT_INVALID",
            ErrorKind::VersionLocked => "VERSION_LOCKED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::AuthFailed => "AUTH_FAILED",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Remote => "REMOTE_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
        }
    }
}

/// Top-level error of every Flowsmith operation.
#[derive(Debug, Clone, Error)]
pub enum FlowsmithError {
    /// No extraction strategy produced a valid document
    #[error("could not extract a flow document (tried: {})", .attempted.join("; "))]
    Parse { attempted: Vec<String> },

    /// Canonical text violates the fixed schema
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Row-addressed content errors from the validator
    #[error("validator rejected {} row error(s)", .0.len())]
    ContentValidation(Vec<ValidationError>),

    /// The target version no longer accepts writes
    #[error("version {version} of artifact {artifact_id} is locked: {message}")]
    VersionLocked {
        artifact_id: String,
        version: String,
        message: String,
    },

    /// A collaborator asked us to slow down
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Credentials were rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport failure or timeout
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success answer from a collaborator
    #[error("remote error{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl FlowsmithError {
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        FlowsmithError::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowsmithError::Parse { .. } => ErrorKind::ParseFailed,
            FlowsmithError::Schema(_) => ErrorKind::SchemaInvalid,
            FlowsmithError::ContentValidation(_) => ErrorKind::ContentInvalid,
            FlowsmithError::VersionLocked { .. } => ErrorKind::VersionLocked,
            FlowsmithError::RateLimited { .. } => ErrorKind::RateLimited,
            FlowsmithError::Auth(_) => ErrorKind::AuthFailed,
            FlowsmithError::Network(_) => ErrorKind::Network,
            FlowsmithError::Remote { .. } => ErrorKind::Remote,
            FlowsmithError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the same request can succeed later or after repair without
    /// the caller changing credentials or configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FlowsmithError::ContentValidation(_)
                | FlowsmithError::VersionLocked { .. }
                | FlowsmithError::RateLimited { .. }
                | FlowsmithError::Network(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FlowsmithError::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }
}

impl From<ValidationShapeError> for FlowsmithError {
    fn from(err: ValidationShapeError) -> Self {
        FlowsmithError::remote(None, err.to_string())
    }
}

impl From<ModelError> for FlowsmithError {
    fn from(err: ModelError) -> Self {
        FlowsmithError::Parse {
            attempted: vec![err.to_string()],
        }
    }
}

/// Result type alias for Flowsmith operations
pub type FlowsmithResult<T> = Result<T, FlowsmithError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_have_distinct_codes() {
        let errors = [
            FlowsmithError::Parse { attempted: vec![] },
            FlowsmithError::Schema(SchemaError::Empty),
            FlowsmithError::ContentValidation(vec![]),
            FlowsmithError::VersionLocked {
                artifact_id: "a".into(),
                version: "v1".into(),
                message: "locked".into(),
            },
            FlowsmithError::RateLimited { retry_after_secs: 3 },
            FlowsmithError::Auth("bad key".into()),
            FlowsmithError::Network("timeout".into()),
            FlowsmithError::remote(Some(500), "boom"),
            FlowsmithError::Config("missing".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.kind().code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_rate_limit_carries_wait() {
        let err = FlowsmithError::RateLimited { retry_after_secs: 12 };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
        assert!(err.is_recoverable());
        assert!(!FlowsmithError::Auth("nope".into()).is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = FlowsmithError::Parse {
            attempted: vec!["FencedBlock: no block".into(), "HeaderScan: no header".into()],
        };
        assert_eq!(
            err.to_string(),
            "could not extract a flow document (tried: FencedBlock: no block; HeaderScan: no header)"
        );
        assert_eq!(FlowsmithError::remote(Some(502), "bad gateway").to_string(), "remote error (502): bad gateway");
        assert_eq!(FlowsmithError::remote(None, "odd").to_string(), "remote error: odd");
    }
}
