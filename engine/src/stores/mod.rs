//! Production provider implementations.
//!
//! - [`RedisHistoryStore`]: last known fix and block windows in Redis
//! - `PostgresDetectionRecorder` / `PostgresWorkZoneDirectory`: audit trail
//!   and zone table in PostgreSQL (feature `postgres`)

pub mod history_redis;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use history_redis::RedisHistoryStore;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresDetectionRecorder, PostgresWorkZoneDirectory};
