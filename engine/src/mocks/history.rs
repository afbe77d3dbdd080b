//! Mock history store for testing.

use super::{Fault, poisoned};
use crate::error::Result;
use crate::providers::HistoryStore;
use chrono::{DateTime, Utc};
use geoguard_core::environment::{Clock, SystemClock};
use geoguard_core::model::{LastKnownFix, LocationSample, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct BlockWindow {
    until: DateTime<Utc>,
    reason: String,
}

/// Mock history store.
///
/// Block windows are measured against the injected clock, so tests using a
/// fixed clock see a stable remaining duration.
#[derive(Clone)]
pub struct MockHistoryStore {
    fixes: Arc<Mutex<HashMap<UserId, LastKnownFix>>>,
    blocks: Arc<Mutex<HashMap<UserId, BlockWindow>>>,
    clock: Arc<dyn Clock>,
    read_fault: Arc<Mutex<Fault>>,
    write_fault: Arc<Mutex<Fault>>,
    block_fault: Arc<Mutex<Fault>>,
    updates: Arc<AtomicUsize>,
}

impl MockHistoryStore {
    /// Empty store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Empty store measuring block windows against `clock`.
    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            fixes: Arc::new(Mutex::new(HashMap::new())),
            blocks: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(clock),
            read_fault: Arc::new(Mutex::new(Fault::None)),
            write_fault: Arc::new(Mutex::new(Fault::None)),
            block_fault: Arc::new(Mutex::new(Fault::None)),
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Store a previous fix for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn seed_fix(&self, user_id: &UserId, sample: LocationSample) -> Result<()> {
        let recorded_at = sample.captured_at;
        self.fixes
            .lock()
            .map_err(|_| poisoned())?
            .insert(user_id.clone(), LastKnownFix::new(sample, recorded_at));
        Ok(())
    }

    /// Current fix for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn fix_for(&self, user_id: &UserId) -> Result<Option<LastKnownFix>> {
        Ok(self.fixes.lock().map_err(|_| poisoned())?.get(user_id).cloned())
    }

    /// Reason of the user's block window, if one was ever set.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn block_reason(&self, user_id: &UserId) -> Result<Option<String>> {
        Ok(self
            .blocks
            .lock()
            .map_err(|_| poisoned())?
            .get(user_id)
            .map(|b| b.reason.clone()))
    }

    /// Number of successful `update_fix` calls.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Fault applied to `last_fix`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_read_fault(&self, fault: Fault) -> Result<()> {
        *self.read_fault.lock().map_err(|_| poisoned())? = fault;
        Ok(())
    }

    /// Fault applied to `update_fix` and `set_block`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_write_fault(&self, fault: Fault) -> Result<()> {
        *self.write_fault.lock().map_err(|_| poisoned())? = fault;
        Ok(())
    }

    /// Fault applied to `is_blocked`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_block_fault(&self, fault: Fault) -> Result<()> {
        *self.block_fault.lock().map_err(|_| poisoned())? = fault;
        Ok(())
    }
}

impl Default for MockHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHistoryStore")
            .field("updates", &self.update_count())
            .finish_non_exhaustive()
    }
}

impl HistoryStore for MockHistoryStore {
    async fn last_fix(&self, user_id: &UserId) -> Result<Option<LastKnownFix>> {
        let fault = *self.read_fault.lock().map_err(|_| poisoned())?;
        fault.apply("history store").await?;
        self.fix_for(user_id)
    }

    async fn update_fix(
        &self,
        user_id: &UserId,
        sample: &LocationSample,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        let fault = *self.write_fault.lock().map_err(|_| poisoned())?;
        fault.apply("history store").await?;

        self.fixes
            .lock()
            .map_err(|_| poisoned())?
            .insert(user_id.clone(), LastKnownFix::new(sample.clone(), recorded_at));
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_blocked(&self, user_id: &UserId) -> Result<Option<Duration>> {
        let fault = *self.block_fault.lock().map_err(|_| poisoned())?;
        fault.apply("history store").await?;

        let now = self.clock.now();
        let blocks = self.blocks.lock().map_err(|_| poisoned())?;
        Ok(blocks
            .get(user_id)
            .and_then(|window| (window.until - now).to_std().ok())
            .filter(|remaining| !remaining.is_zero()))
    }

    async fn set_block(&self, user_id: &UserId, duration: Duration, reason: &str) -> Result<()> {
        let fault = *self.write_fault.lock().map_err(|_| poisoned())?;
        fault.apply("history store").await?;

        let span = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let until = self
            .clock
            .now()
            .checked_add_signed(span)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.blocks.lock().map_err(|_| poisoned())?.insert(
            user_id.clone(),
            BlockWindow {
                until,
                reason: reason.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Clone)]
    struct At(DateTime<Utc>);

    impl Clock for At {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[tokio::test]
    async fn test_block_window_against_clock() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let store = MockHistoryStore::with_clock(At(now));
        let user = UserId::new("u-1");

        assert_eq!(store.is_blocked(&user).await.unwrap(), None);
        store
            .set_block(&user, Duration::from_secs(3600), "critical risk")
            .await
            .unwrap();
        assert_eq!(
            store.is_blocked(&user).await.unwrap(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            store.block_reason(&user).unwrap().as_deref(),
            Some("critical risk")
        );
    }

    #[tokio::test]
    async fn test_update_overwrites_fix() {
        let store = MockHistoryStore::new();
        let user = UserId::new("u-1");
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        store.update_fix(&user, &LocationSample::new(1.0, 1.0, at), at).await.unwrap();
        store.update_fix(&user, &LocationSample::new(2.0, 2.0, at), at).await.unwrap();

        let fix = store.last_fix(&user).await.unwrap().unwrap();
        assert!((fix.sample.latitude - 2.0).abs() < f64::EPSILON);
        assert_eq!(store.update_count(), 2);
    }
}
