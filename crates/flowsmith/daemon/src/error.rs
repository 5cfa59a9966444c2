//! Error types for flowsmith-daemon

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use flowsmith_types::{ErrorKind, FlowsmithError};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Component construction error
    #[error("Flowsmith error: {0}")]
    Flow(#[from] FlowsmithError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Failure from the flow pipeline
    #[error(transparent)]
    Flow(#[from] FlowsmithError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Status and machine code. Every pipeline error kind gets its own
    /// status so callers can tell retryable failures from bad input.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Flow(err) => {
                let status = match err.kind() {
                    ErrorKind::SchemaInvalid => StatusCode::BAD_REQUEST,
                    ErrorKind::AuthFailed => StatusCode::UNAUTHORIZED,
                    ErrorKind::ContentInvalid => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::VersionLocked => StatusCode::LOCKED,
                    ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                    ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::ParseFailed => StatusCode::BAD_GATEWAY,
                    ErrorKind::Network => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorKind::Remote => StatusCode::FAILED_DEPENDENCY,
                };
                (status, err.kind().code())
            }
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Flow(FlowsmithError::ContentValidation(errors)) => Some(json!({ "errors": errors })),
            ApiError::Flow(FlowsmithError::Parse { attempted }) => Some(json!({ "attempted": attempted })),
            ApiError::Flow(FlowsmithError::RateLimited { retry_after_secs }) => {
                Some(json!({ "retryAfterSecs": retry_after_secs }))
            }
            ApiError::Flow(FlowsmithError::Remote { status: Some(status), .. }) => {
                Some(json!({ "upstreamStatus": status }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let retry_after = match &self {
            ApiError::Flow(err) => err.retry_after(),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: self.details(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(wait) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&wait.as_secs().to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_types::{SchemaError, ValidationError};
    use std::collections::HashSet;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::BadRequest("missing document".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FlowsmithError::Auth("expired".into())).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(FlowsmithError::Schema(SchemaError::Empty)).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_each_pipeline_error_kind_has_its_own_status() {
        let errors = vec![
            FlowsmithError::Parse { attempted: vec![] },
            FlowsmithError::Schema(SchemaError::Empty),
            FlowsmithError::ContentValidation(vec![]),
            FlowsmithError::VersionLocked {
                artifact_id: "bot".into(),
                version: "v2".into(),
                message: "locked".into(),
            },
            FlowsmithError::RateLimited { retry_after_secs: 5 },
            FlowsmithError::Auth("denied".into()),
            FlowsmithError::Network("reset".into()),
            FlowsmithError::remote(Some(418), "teapot"),
            FlowsmithError::Config("no backend".into()),
        ];
        let statuses: HashSet<StatusCode> = errors
            .into_iter()
            .map(|err| ApiError::from(err).status_and_code().0)
            .collect();
        assert_eq!(statuses.len(), 9);
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::from(FlowsmithError::RateLimited { retry_after_secs: 42 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn test_content_errors_carry_details() {
        let err = ApiError::from(FlowsmithError::ContentValidation(vec![ValidationError::for_node(
            3,
            "routing",
            "Next Nodes",
            "dangling",
        )]));
        let details = err.details().unwrap();
        assert_eq!(details["errors"][0]["nodeIdentifier"], 3);
        assert_eq!(err.status_and_code().1, "CONTENT_INVALID");
    }
}
