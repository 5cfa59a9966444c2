//! Classification of validator submission responses.
//!
//! A rejected submission is either a content problem (row-addressed errors
//! the repair engine can act on) or a version lock (the target version no
//! longer accepts writes). The two must never be confused: a lock sent to
//! repair burns iterations on rows that are fine, and content errors sent
//! to the version manager create versions that fail the same way.

use flowsmith_resilience::classify_status;
use flowsmith_types::{normalize_errors, FlowsmithError, FlowsmithResult, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fragments that mark an out-of-band error as a version lock.
const LOCK_MARKERS: &[&str] = &[
    "locked",
    "immutable",
    "read-only",
    "read only",
    "sealed",
    "cannot be modified",
    "no longer accepts",
];

/// What a submission to one version produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Accepted,
    ContentErrors { errors: Vec<ValidationError> },
    VersionLocked { message: String },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted)
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, SubmissionOutcome::VersionLocked { .. })
    }
}

/// Whether `text` describes a version lock.
pub fn is_lock_message(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    LOCK_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Classify a submission response from its status, raw body and
/// `Retry-After` header.
///
/// Statuses outside the validator's vocabulary surface as errors
/// classified by [`classify_status`].
pub fn classify_submission(
    status: u16,
    body: &str,
    retry_after: Option<&str>,
) -> FlowsmithResult<SubmissionOutcome> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    match status {
        200..=299 => match parsed {
            Some(value) if carries_errors(&value) => from_error_report(status, &value, body),
            Some(value) if explicitly_rejected(&value) => {
                let message = body_message(&value).unwrap_or_else(|| "submission rejected".to_string());
                Ok(from_general_message(message))
            }
            _ => Ok(SubmissionOutcome::Accepted),
        },
        409 | 423 => Ok(SubmissionOutcome::VersionLocked {
            message: parsed
                .as_ref()
                .and_then(body_message)
                .unwrap_or_else(|| fallback_text(body, "version is locked")),
        }),
        400 | 422 => match parsed {
            Some(value) => from_error_report(status, &value, body),
            None => Err(FlowsmithError::remote(Some(status), fallback_text(body, "bad request"))),
        },
        _ => {
            let message = parsed
                .as_ref()
                .and_then(body_message)
                .unwrap_or_else(|| fallback_text(body, "validator request failed"));
            Err(classify_status(status, retry_after).into_error(status, message))
        }
    }
}

fn from_error_report(status: u16, value: &Value, body: &str) -> FlowsmithResult<SubmissionOutcome> {
    let errors = normalize_errors(value)?;
    if errors.is_empty() {
        return if (200..300).contains(&status) {
            Ok(SubmissionOutcome::Accepted)
        } else {
            Err(FlowsmithError::remote(Some(status), fallback_text(body, "rejected without errors")))
        };
    }

    if errors.iter().all(|error| !error.is_row_addressed()) {
        if let Some(lock) = errors
            .iter()
            .find(|error| is_lock_message(&error.message) || is_lock_message(&error.category))
        {
            return Ok(SubmissionOutcome::VersionLocked {
                message: lock.message.clone(),
            });
        }
    }

    Ok(SubmissionOutcome::ContentErrors { errors })
}

fn from_general_message(message: String) -> SubmissionOutcome {
    if is_lock_message(&message) {
        SubmissionOutcome::VersionLocked { message }
    } else {
        SubmissionOutcome::ContentErrors {
            errors: vec![ValidationError::general("validation", message)],
        }
    }
}

fn carries_errors(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map
            .get("errors")
            .map_or(false, |errors| !errors.is_null() && errors != &Value::Array(Vec::new())),
        _ => false,
    }
}

fn explicitly_rejected(value: &Value) -> bool {
    ["accepted", "success", "valid"]
        .iter()
        .any(|key| value.get(key).and_then(Value::as_bool) == Some(false))
}

fn body_message(value: &Value) -> Option<String> {
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| {
            value
                .get("errors")
                .and_then(|errors| normalize_errors(errors).ok())
                .and_then(|errors| errors.into_iter().next())
                .map(|error| error.message)
        })
}

fn fallback_text(body: &str, default: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}
