//! Flowsmith Resilience - behaviour around unreliable collaborators
//!
//! - **classify**: map HTTP statuses to rate-limit, auth, transient and
//!   permanent failures
//! - **retry**: bounded exponential backoff for idempotent reads
//! - **guard**: surface rate limits immediately and fail fast while one
//!   is in effect
//! - **memo**: explicit populate-once caches
//! - **pending**: correlation of asynchronous replies, with timeouts that
//!   free their slot

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod classify;
pub mod guard;
pub mod memo;
pub mod pending;
pub mod retry;

pub use classify::{classify_status, parse_retry_after, FailureClass, DEFAULT_RETRY_AFTER};
pub use guard::RateLimitGuard;
pub use memo::Memo;
pub use pending::{CallId, PendingCalls, PendingReply};
pub use retry::RetryPolicy;
