//! Classification of remote failures.

use chrono::{DateTime, Utc};
use flowsmith_types::FlowsmithError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wait assumed when a rate-limited response carries no usable
/// `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// What a non-success response means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    /// Try again after the given wait.
    RateLimited { retry_after: Duration },
    /// Credentials rejected; retrying will not help.
    Auth,
    /// May succeed if repeated.
    Transient,
    /// Will fail again with the same input.
    Permanent,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureClass::Transient)
    }

    /// The error this failure surfaces as.
    pub fn into_error(self, status: u16, message: impl Into<String>) -> FlowsmithError {
        let message = message.into();
        match self {
            FailureClass::RateLimited { retry_after } => FlowsmithError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            },
            FailureClass::Auth => FlowsmithError::Auth(message),
            FailureClass::Transient => {
                FlowsmithError::Network(format!("status {}: {}", status, message))
            }
            FailureClass::Permanent => FlowsmithError::remote(Some(status), message),
        }
    }
}

/// Classify an HTTP status, given the raw `Retry-After` header if any.
pub fn classify_status(status: u16, retry_after: Option<&str>) -> FailureClass {
    match status {
        429 => FailureClass::RateLimited {
            retry_after: retry_after
                .and_then(|value| parse_retry_after(value, Utc::now()))
                .unwrap_or(DEFAULT_RETRY_AFTER),
        },
        401 | 403 => FailureClass::Auth,
        408 | 425 | 500 | 502 | 503 | 504 => FailureClass::Transient,
        _ => FailureClass::Permanent,
    }
}

/// `Retry-After` is either delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(classify_status(401, None), FailureClass::Auth);
        assert_eq!(classify_status(403, None), FailureClass::Auth);
        assert_eq!(classify_status(503, None), FailureClass::Transient);
        assert_eq!(classify_status(400, None), FailureClass::Permanent);
        assert_eq!(
            classify_status(429, Some("12")),
            FailureClass::RateLimited { retry_after: Duration::from_secs(12) }
        );
        assert_eq!(
            classify_status(429, Some("soon")),
            FailureClass::RateLimited { retry_after: DEFAULT_RETRY_AFTER }
        );
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2026 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2026 07:28:45 GMT", now),
            Some(Duration::from_secs(45))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2026 07:27:00 GMT", now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_errors_keep_their_category() {
        let err = classify_status(429, Some("7")).into_error(429, "slow down");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(matches!(
            FailureClass::Auth.into_error(401, "bad key"),
            FlowsmithError::Auth(_)
        ));
        assert!(matches!(
            FailureClass::Transient.into_error(502, "bad gateway"),
            FlowsmithError::Network(_)
        ));
    }
}
