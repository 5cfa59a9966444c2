//! Explicit memoization slots.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// A value computed at most once per population. When two callers race to
/// populate the slot, the first one to write wins and the other receives
/// the stored value.
#[derive(Debug)]
pub struct Memo<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, if populated.
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store `value` unless a value is already present; returns the value
    /// now in the slot.
    pub fn set(&self, value: T) -> Arc<T> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(existing) => Arc::clone(existing),
            None => {
                let value = Arc::new(value);
                *slot = Some(Arc::clone(&value));
                value
            }
        }
    }

    /// Stored value, or the result of `init` stored as the value. Failures
    /// are not stored.
    pub async fn get_or_try_init<E, F, Fut>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        let value = init().await?;
        Ok(self.set(value))
    }

    /// Empty the slot; the next access recomputes.
    pub fn invalidate(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_populated(&self) -> bool {
        self.get().is_some()
    }
}
