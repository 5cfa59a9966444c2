//! Parse failure reporting.

use crate::strategy::Strategy;
use flowsmith_types::FlowsmithError;
use std::fmt;
use thiserror::Error;

/// Why one strategy did not produce a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: Strategy,
    pub reason: String,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

/// Every strategy failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no strategy produced a valid flow document ({} attempted)", .attempted.len())]
pub struct ParseFailure {
    /// One entry per strategy, in the order they ran.
    pub attempted: Vec<Attempt>,
}

impl ParseFailure {
    pub fn reason_for(&self, strategy: Strategy) -> Option<&str> {
        self.attempted
            .iter()
            .find(|attempt| attempt.strategy == strategy)
            .map(|attempt| attempt.reason.as_str())
    }
}

impl From<ParseFailure> for FlowsmithError {
    fn from(failure: ParseFailure) -> Self {
        FlowsmithError::Parse {
            attempted: failure.attempted.iter().map(Attempt::to_string).collect(),
        }
    }
}

/// Result type alias for parser operations
pub type ParseResult<T> = Result<T, ParseFailure>;
