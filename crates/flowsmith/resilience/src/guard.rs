//! Rate-limit guard for generation calls.
//!
//! Generation calls are never retried internally. After a rate-limited
//! answer the guard refuses further calls until the announced wait has
//! passed, so callers get the remaining wait straight away instead of
//! spending another request on a known refusal.

use flowsmith_types::{FlowsmithError, FlowsmithResult};
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct RateLimitGuard {
    blocked_until: Mutex<Option<Instant>>,
}

impl RateLimitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining wait, if the guard is currently closed.
    pub fn remaining(&self) -> Option<Duration> {
        let blocked = self.blocked_until.lock().unwrap_or_else(PoisonError::into_inner);
        blocked
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }

    /// Run `call` unless a previous rate limit is still in effect.
    pub async fn call<T, Fut>(&self, call: Fut) -> FlowsmithResult<T>
    where
        Fut: Future<Output = FlowsmithResult<T>>,
    {
        if let Some(left) = self.remaining() {
            info!(wait_secs = left.as_secs(), "Skipping call while rate limited");
            return Err(FlowsmithError::RateLimited {
                retry_after_secs: round_up_secs(left),
            });
        }

        let result = call.await;
        match &result {
            Err(FlowsmithError::RateLimited { retry_after_secs }) => {
                warn!(retry_after_secs, "Collaborator rate limited the request");
                self.block_for(Duration::from_secs(*retry_after_secs));
            }
            Err(FlowsmithError::Auth(reason)) => {
                warn!(reason = %reason, "Collaborator rejected credentials");
            }
            _ => {}
        }
        result
    }

    fn block_for(&self, wait: Duration) {
        let mut blocked = self.blocked_until.lock().unwrap_or_else(PoisonError::into_inner);
        let until = Instant::now() + wait;
        if blocked.map_or(true, |current| until > current) {
            *blocked = Some(until);
        }
    }
}

fn round_up_secs(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limit_is_surfaced_and_remembered() {
        let guard = RateLimitGuard::new();
        let first: FlowsmithResult<()> = guard
            .call(async { Err(FlowsmithError::RateLimited { retry_after_secs: 60 }) })
            .await;
        assert_eq!(first.unwrap_err().retry_after(), Some(Duration::from_secs(60)));

        let mut called = false;
        let second: FlowsmithResult<()> = guard
            .call(async {
                called = true;
                Ok(())
            })
            .await;
        assert!(!called);
        let wait = second.unwrap_err().retry_after().unwrap();
        assert!(wait <= Duration::from_secs(60) && wait >= Duration::from_secs(59));
    }

    #[tokio::test]
    async fn test_auth_failure_passes_through_without_blocking() {
        let guard = RateLimitGuard::new();
        let result: FlowsmithResult<()> = guard
            .call(async { Err(FlowsmithError::Auth("invalid api key".into())) })
            .await;
        assert!(matches!(result, Err(FlowsmithError::Auth(_))));
        assert!(guard.remaining().is_none());
        assert_eq!(guard.call(async { Ok(5) }).await.unwrap(), 5);
    }
}
