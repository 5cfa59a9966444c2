//! Correlation of asynchronous replies with the calls awaiting them.
//!
//! A caller registers a slot, sends its request over some channel tagged
//! with the slot id, and waits. Whoever receives the reply resolves the
//! slot by id. A slot is removed when its [`PendingReply`] is dropped, so
//! a wait that times out or a caller that is cancelled mid-flight both free
//! it, and late replies find nothing.

use dashmap::DashMap;
use flowsmith_types::{FlowsmithError, FlowsmithResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Identifier of one pending call.
pub type CallId = Uuid;

#[derive(Debug)]
pub struct PendingCalls<T> {
    slots: Arc<DashMap<CallId, oneshot::Sender<T>>>,
}

impl<T> Default for PendingCalls<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }
}

/// Receiving half of a registered slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct PendingReply<T> {
    pub id: CallId,
    receiver: oneshot::Receiver<T>,
    slots: Arc<DashMap<CallId, oneshot::Sender<T>>>,
}

impl<T> Drop for PendingReply<T> {
    fn drop(&mut self) {
        self.slots.remove(&self.id);
    }
}

impl<T> PendingCalls<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a slot.
    pub fn register(&self) -> PendingReply<T> {
        let id = Uuid::new_v4();
        let (sender, receiver) = oneshot::channel();
        self.slots.insert(id, sender);
        PendingReply {
            id,
            receiver,
            slots: Arc::clone(&self.slots),
        }
    }

    /// Deliver a reply. Returns `false` when no call is waiting for `id`.
    pub fn resolve(&self, id: &CallId, value: T) -> bool {
        match self.slots.remove(id) {
            Some((_, sender)) => sender.send(value).is_ok(),
            None => {
                debug!(call_id = %id, "Dropping reply for unknown or expired call");
                false
            }
        }
    }

    /// Wait for the reply to `pending`, freeing its slot on timeout.
    pub async fn wait(&self, mut pending: PendingReply<T>, timeout: Duration) -> FlowsmithResult<T> {
        let id = pending.id;
        let outcome = tokio::time::timeout(timeout, &mut pending.receiver).await;
        drop(pending);
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(FlowsmithError::Network(format!("reply channel for call {} closed", id))),
            Err(_) => Err(FlowsmithError::Network(format!(
                "no reply for call {} within {}ms",
                id,
                timeout.as_millis()
            ))),
        }
    }

    /// Number of calls still waiting.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_reaches_its_caller() {
        let calls: Arc<PendingCalls<String>> = Arc::new(PendingCalls::new());
        let pending = calls.register();
        let id = pending.id;

        let responder = Arc::clone(&calls);
        tokio::spawn(async move {
            responder.resolve(&id, "docs for widgets".to_string());
        });

        let reply = calls.wait(pending, Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply, "docs for widgets");
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_frees_the_slot() {
        let calls: PendingCalls<String> = PendingCalls::new();
        let pending = calls.register();
        let id = pending.id;
        assert_eq!(calls.len(), 1);

        let result = calls.wait(pending, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(FlowsmithError::Network(_))));
        assert!(calls.is_empty());
        assert!(!calls.resolve(&id, "late".to_string()));
    }

    #[tokio::test]
    async fn test_abandoned_wait_frees_the_slot() {
        let calls: PendingCalls<String> = PendingCalls::new();
        let pending = calls.register();
        let id = pending.id;

        let cut_short =
            tokio::time::timeout(Duration::from_millis(10), calls.wait(pending, Duration::from_secs(30))).await;
        assert!(cut_short.is_err());
        assert!(calls.is_empty());
        assert!(!calls.resolve(&id, "late".to_string()));
    }

    #[test]
    fn test_dropping_an_unawaited_reply_frees_the_slot() {
        let calls: PendingCalls<u32> = PendingCalls::new();
        let kept = calls.register();
        drop(calls.register());
        assert_eq!(calls.len(), 1);
        assert!(calls.resolve(&kept.id, 7));
    }
}
