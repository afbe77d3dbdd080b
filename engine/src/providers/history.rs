//! Per-user location history and block windows.

use crate::error::Result;
use chrono::{DateTime, Utc};
use geoguard_core::model::{LastKnownFix, LocationSample, UserId};
use std::future::Future;
use std::time::Duration;

/// Last known fix and block state, keyed by user.
///
/// # Implementation Notes
///
/// - One fix per user, overwritten by every evaluation (last write wins).
/// - The engine serializes read-then-write per user with its own keyed
///   lock, so implementations only need single-key atomicity.
/// - Block windows expire on their own; nothing in the engine clears them.
pub trait HistoryStore: Send + Sync {
    /// The user's last stored fix, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable or the value is corrupt.
    fn last_fix(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<LastKnownFix>>> + Send;

    /// Replace the user's last fix.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    fn update_fix(
        &self,
        user_id: &UserId,
        sample: &LocationSample,
        recorded_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Time left on the user's block window, or `None` when not blocked.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn is_blocked(&self, user_id: &UserId) -> impl Future<Output = Result<Option<Duration>>> + Send;

    /// Open a block window for `duration`.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    fn set_block(
        &self,
        user_id: &UserId,
        duration: Duration,
        reason: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}
