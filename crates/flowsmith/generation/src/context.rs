//! Read-only context lookups for generation.
//!
//! Lookups are independent of each other, so every (source, topic) pair
//! runs concurrently. A failing lookup only loses its own snippets.

use async_trait::async_trait;
use dashmap::DashMap;
use flowsmith_resilience::{CallId, Memo, PendingCalls};
use flowsmith_types::{FlowsmithError, FlowsmithResult};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// One piece of reference text handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub source: String,
    pub topic: String,
    pub content: String,
}

impl ContextSnippet {
    pub fn new(source: impl Into<String>, topic: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            topic: topic.into(),
            content: content.into(),
        }
    }
}

/// A read-only lookup channel such as documentation search.
#[async_trait]
pub trait ContextSource: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, topic: &str) -> FlowsmithResult<Vec<ContextSnippet>>;
}

/// Fans lookups out over every source and topic.
#[derive(Clone, Default)]
pub struct ContextGatherer {
    sources: Vec<Arc<dyn ContextSource>>,
}

impl ContextGatherer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn ContextSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Snippets for `topics`, in source order then topic order.
    pub async fn gather(&self, topics: &[String]) -> Vec<ContextSnippet> {
        let lookups = self.sources.iter().flat_map(|source| {
            topics.iter().map(move |topic| async move {
                (source.name(), topic.as_str(), source.lookup(topic).await)
            })
        });

        let mut snippets = Vec::new();
        for (source, topic, result) in join_all(lookups).await {
            match result {
                Ok(found) => {
                    debug!(source, topic, count = found.len(), "Context lookup finished");
                    snippets.extend(found);
                }
                Err(err) => warn!(source, topic, error = %err, "Context lookup failed, continuing without it"),
            }
        }
        snippets
    }
}

/// Memoizes another source per topic. Each topic is looked up at most once
/// until invalidated; failed lookups are not remembered.
pub struct CachedSource {
    inner: Arc<dyn ContextSource>,
    cache: DashMap<String, Arc<Memo<Vec<ContextSnippet>>>>,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn ContextSource>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Forget the cached result for `topic`.
    pub fn invalidate(&self, topic: &str) {
        if let Some(memo) = self.cache.get(topic) {
            memo.invalidate();
        }
    }

    pub fn invalidate_all(&self) {
        for entry in self.cache.iter() {
            entry.value().invalidate();
        }
    }

    fn memo_for(&self, topic: &str) -> Arc<Memo<Vec<ContextSnippet>>> {
        Arc::clone(self.cache.entry(topic.to_string()).or_default().value())
    }
}

#[async_trait]
impl ContextSource for CachedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn lookup(&self, topic: &str) -> FlowsmithResult<Vec<ContextSnippet>> {
        let memo = self.memo_for(topic);
        let snippets = memo.get_or_try_init(|| self.inner.lookup(topic)).await?;
        Ok(snippets.as_ref().clone())
    }
}

/// A lookup request delivered to whoever serves the channel.
#[derive(Debug, Clone)]
pub struct LookupRequest {
    pub id: CallId,
    pub topic: String,
}

/// Context source answered asynchronously over a channel. Requests carry
/// a call id; replies are matched back to the waiting lookup by that id.
pub struct ChannelContextSource {
    name: String,
    requests: mpsc::Sender<LookupRequest>,
    pending: Arc<PendingCalls<Vec<ContextSnippet>>>,
    timeout: Duration,
}

/// Serving end of a [`ChannelContextSource`].
pub struct LookupInbox {
    requests: Mutex<mpsc::Receiver<LookupRequest>>,
    pending: Arc<PendingCalls<Vec<ContextSnippet>>>,
}

impl ChannelContextSource {
    pub fn channel(name: impl Into<String>, capacity: usize, timeout: Duration) -> (Self, LookupInbox) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let pending = Arc::new(PendingCalls::new());
        (
            Self {
                name: name.into(),
                requests: sender,
                pending: Arc::clone(&pending),
                timeout,
            },
            LookupInbox {
                requests: Mutex::new(receiver),
                pending,
            },
        )
    }

    /// Lookups still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl ContextSource for ChannelContextSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, topic: &str) -> FlowsmithResult<Vec<ContextSnippet>> {
        let reply = self.pending.register();
        let request = LookupRequest {
            id: reply.id,
            topic: topic.to_string(),
        };
        if self.requests.send(request).await.is_err() {
            return Err(FlowsmithError::Network(format!(
                "context channel {} is closed",
                self.name
            )));
        }
        self.pending.wait(reply, self.timeout).await
    }
}

impl LookupInbox {
    /// Next lookup request; `None` once every source handle is dropped.
    pub async fn next_request(&self) -> Option<LookupRequest> {
        self.requests.lock().await.recv().await
    }

    /// Answer a request. Returns `false` when the lookup already gave up.
    pub fn reply(&self, id: &CallId, snippets: Vec<ContextSnippet>) -> bool {
        self.pending.resolve(id, snippets)
    }
}
