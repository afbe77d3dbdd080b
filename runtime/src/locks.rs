//! Keyed async locks.
//!
//! [`KeyedLocks`] hands out one `tokio` mutex per key (a user id, in the
//! engine) so that work for the same key is serialized while work for
//! different keys runs freely. Entries are held weakly: once the last guard
//! and waiter for a key are gone, the slot is dropped and later pruned.
//!
//! ```
//! use geoguard_runtime::locks::KeyedLocks;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), geoguard_runtime::locks::LockError> {
//! let locks = KeyedLocks::new();
//! let guard = locks.acquire("user-1", Duration::from_secs(1)).await?;
//! // read-modify-write for user-1
//! drop(guard);
//! # Ok(())
//! # }
//! ```

use crate::metrics::LockMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Dead slots are swept once the map grows past this many entries.
const PRUNE_THRESHOLD: usize = 1024;

/// Lock acquisition errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock was still held when the timeout elapsed.
    #[error("Timed out after {waited:?} waiting for lock on {key}")]
    Timeout {
        /// Contended key
        key: String,
        /// How long the attempt waited
        waited: Duration,
    },

    /// The slot map was poisoned by a panicking thread.
    #[error("Lock registry poisoned")]
    Poisoned,
}

impl LockError {
    /// Returns `true` for contention, which is worth retrying.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Guard for one key. The lock is released on drop.
#[derive(Debug)]
pub struct KeyedLockGuard {
    key: String,
    waited: Duration,
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLockGuard {
    /// Key this guard holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// How long acquisition waited.
    #[must_use]
    pub const fn waited(&self) -> Duration {
        self.waited
    }
}

/// One async mutex per key.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Result<Arc<AsyncMutex<()>>, LockError> {
        let mut slots = self.slots.lock().map_err(|_| LockError::Poisoned)?;

        if let Some(existing) = slots.get(key).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        if slots.len() >= PRUNE_THRESHOLD {
            slots.retain(|_, weak| weak.strong_count() > 0);
        }

        let slot = Arc::new(AsyncMutex::new(()));
        slots.insert(key.to_string(), Arc::downgrade(&slot));
        Ok(slot)
    }

    /// Acquire the lock for `key`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if the lock is still held when the
    /// timeout elapses, or [`LockError::Poisoned`] if the registry is
    /// unusable.
    pub async fn acquire(&self, key: &str, timeout: Duration) -> Result<KeyedLockGuard, LockError> {
        let slot = self.slot(key)?;
        let started = Instant::now();

        let result = tokio::time::timeout(timeout, slot.lock_owned()).await;
        let waited = started.elapsed();
        LockMetrics::record_wait(waited);

        match result {
            Ok(guard) => Ok(KeyedLockGuard {
                key: key.to_string(),
                waited,
                _guard: guard,
            }),
            Err(_) => {
                tracing::debug!(key, waited = ?waited, "Lock acquisition timed out");
                Err(LockError::Timeout {
                    key: key.to_string(),
                    waited,
                })
            }
        }
    }

    /// Acquire with a timeout per attempt, retrying contention per `policy`.
    ///
    /// # Errors
    ///
    /// Returns the last [`LockError::Timeout`] when every attempt timed out.
    pub async fn acquire_with_retry(
        &self,
        key: &str,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<KeyedLockGuard, LockError> {
        retry_with_predicate(policy, || self.acquire(key, timeout), LockError::is_timeout).await
    }

    /// Number of keys with a live lock or waiter.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }
}
