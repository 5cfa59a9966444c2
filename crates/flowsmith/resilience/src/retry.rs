//! Bounded retry for idempotent reads.

use flowsmith_types::{FlowsmithError, FlowsmithResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on every further attempt.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt number `attempt` (1-based, so attempt 2 waits
    /// `base_delay`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Run an idempotent read, retrying network failures only.
    ///
    /// Rate limiting, authentication and every other error is returned
    /// immediately.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> FlowsmithResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FlowsmithResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(FlowsmithError::Network(reason)) if attempt < attempts => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Retrying after network failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if matches!(err, FlowsmithError::Network(_)) {
                        warn!(operation, attempts, error = %err, "Giving up after retries");
                    }
                    return Err(err);
                }
            }
        }
    }
}
