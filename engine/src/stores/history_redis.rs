//! Redis-backed history store.
//!
//! # Architecture
//!
//! - **Last fix**: `geoguard:history:{user_id}` → JSON [`LastKnownFix`],
//!   refreshed on every write with a long TTL so inactive users age out
//! - **Block window**: `geoguard:block:{user_id}` → block reason, with the
//!   block duration as TTL; the remaining time is the key's PTTL
//!
//! # Example
//!
//! ```no_run
//! use geoguard_engine::stores::RedisHistoryStore;
//! use geoguard_runtime::RetryPolicy;
//!
//! # async fn example() -> geoguard_engine::Result<()> {
//! let store = RedisHistoryStore::connect("redis://127.0.0.1:6379", &RetryPolicy::default()).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{EngineError, Result};
use crate::providers::HistoryStore;
use chrono::{DateTime, Utc};
use geoguard_core::model::{LastKnownFix, LocationSample, UserId};
use geoguard_runtime::retry::{RetryPolicy, retry_with_backoff};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// How long an untouched last fix is kept (30 days).
pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// Redis history store.
///
/// Cheap to clone; clones share the connection manager.
#[derive(Clone)]
pub struct RedisHistoryStore {
    conn_manager: ConnectionManager,
    history_ttl: Duration,
}

impl RedisHistoryStore {
    /// Connect to Redis, retrying the initial connection per `retry`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingDependency`] for a malformed URL, or
    /// [`EngineError::Unavailable`] once every connection attempt failed.
    pub async fn connect(redis_url: &str, retry: &RetryPolicy) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| EngineError::MissingDependency(format!("Invalid Redis URL: {e}")))?;

        let conn_manager = retry_with_backoff(retry, || ConnectionManager::new(client.clone()))
            .await
            .map_err(|e| EngineError::Unavailable(format!("Redis connection failed: {e}")))?;

        tracing::info!("Connected history store to Redis");
        Ok(Self {
            conn_manager,
            history_ttl: DEFAULT_HISTORY_TTL,
        })
    }

    /// Keep untouched fixes for `ttl` instead of [`DEFAULT_HISTORY_TTL`].
    #[must_use]
    pub const fn with_history_ttl(mut self, ttl: Duration) -> Self {
        self.history_ttl = ttl;
        self
    }

    fn history_key(user_id: &UserId) -> String {
        format!("geoguard:history:{user_id}")
    }

    fn block_key(user_id: &UserId) -> String {
        format!("geoguard:block:{user_id}")
    }
}

impl std::fmt::Debug for RedisHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisHistoryStore")
            .field("history_ttl", &self.history_ttl)
            .finish_non_exhaustive()
    }
}

/// Whole seconds for `SET EX`, at least one.
fn ttl_seconds(duration: Duration) -> u64 {
    duration.as_secs().max(1)
}

/// Remaining block time from a `PTTL` reply.
///
/// `-2` (no key) and `-1` (no expiry, never written by this store) both
/// mean "not blocked".
fn remaining_from_pttl(pttl_ms: i64) -> Option<Duration> {
    u64::try_from(pttl_ms)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn storage_error(action: &str, e: &redis::RedisError) -> EngineError {
    if e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal() {
        EngineError::Unavailable(format!("Redis {action}: {e}"))
    } else {
        EngineError::Storage(format!("Redis {action}: {e}"))
    }
}

impl HistoryStore for RedisHistoryStore {
    async fn last_fix(&self, user_id: &UserId) -> Result<Option<LastKnownFix>> {
        let mut conn = self.conn_manager.clone();

        let raw: Option<String> = conn
            .get(Self::history_key(user_id))
            .await
            .map_err(|e| storage_error("read last fix", &e))?;

        raw.map(|json| serde_json::from_str(&json).map_err(EngineError::from))
            .transpose()
    }

    async fn update_fix(
        &self,
        user_id: &UserId,
        sample: &LocationSample,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let fix = LastKnownFix::new(sample.clone(), recorded_at);
        let json = serde_json::to_string(&fix)?;

        let _: () = conn
            .set_ex(Self::history_key(user_id), json, ttl_seconds(self.history_ttl))
            .await
            .map_err(|e| storage_error("write last fix", &e))?;

        tracing::debug!(user_id = %user_id, "Stored last known fix");
        Ok(())
    }

    async fn is_blocked(&self, user_id: &UserId) -> Result<Option<Duration>> {
        let mut conn = self.conn_manager.clone();

        let pttl: i64 = conn
            .pttl(Self::block_key(user_id))
            .await
            .map_err(|e| storage_error("read block window", &e))?;

        Ok(remaining_from_pttl(pttl))
    }

    async fn set_block(&self, user_id: &UserId, duration: Duration, reason: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let ttl = ttl_seconds(duration);

        let _: () = conn
            .set_ex(Self::block_key(user_id), reason, ttl)
            .await
            .map_err(|e| storage_error("write block window", &e))?;

        tracing::info!(
            user_id = %user_id,
            ttl_seconds = ttl,
            "Stored block window in Redis"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use geoguard_core::model::Coordinate;

    #[test]
    fn test_keys_are_namespaced_per_user() {
        let user = UserId::new("u-42");
        assert_eq!(RedisHistoryStore::history_key(&user), "geoguard:history:u-42");
        assert_eq!(RedisHistoryStore::block_key(&user), "geoguard:block:u-42");
    }

    #[test]
    fn test_pttl_interpretation() {
        assert_eq!(remaining_from_pttl(-2), None);
        assert_eq!(remaining_from_pttl(-1), None);
        assert_eq!(remaining_from_pttl(0), None);
        assert_eq!(remaining_from_pttl(1_500), Some(Duration::from_millis(1_500)));
    }

    #[test]
    fn test_ttl_never_zero() {
        assert_eq!(ttl_seconds(Duration::from_millis(200)), 1);
        assert_eq!(ttl_seconds(Duration::from_secs(86_400)), 86_400);
    }

    // Note: the tests below require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_history_round_trip() {
        let store = RedisHistoryStore::connect("redis://127.0.0.1:6379", &RetryPolicy::default())
            .await
            .unwrap();
        let user = UserId::new(format!("test-{}", uuid::Uuid::new_v4()));
        let now = Utc::now();
        let sample = LocationSample::new(-6.2088, 106.8456, now).with_accuracy(12.0);

        assert!(store.last_fix(&user).await.unwrap().is_none());
        store.update_fix(&user, &sample, now).await.unwrap();

        let fix = store.last_fix(&user).await.unwrap().unwrap();
        assert_eq!(fix.coordinate(), Coordinate::new(-6.2088, 106.8456));
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_block_window() {
        let store = RedisHistoryStore::connect("redis://127.0.0.1:6379", &RetryPolicy::default())
            .await
            .unwrap();
        let user = UserId::new(format!("test-{}", uuid::Uuid::new_v4()));

        assert!(store.is_blocked(&user).await.unwrap().is_none());
        store
            .set_block(&user, Duration::from_secs(60), "critical risk")
            .await
            .unwrap();

        let remaining = store.is_blocked(&user).await.unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(50));
    }
}
