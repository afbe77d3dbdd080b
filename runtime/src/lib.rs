//! # GeoGuard Runtime
//!
//! Execution support shared by the engine and its stores.
//!
//! ## Modules
//!
//! - [`retry`] - Bounded retry with exponential backoff
//! - [`locks`] - Keyed async locks for per-user serialization
//! - [`metrics`] - Prometheus metric names, descriptions and recorders

/// Retry logic with exponential backoff
pub mod retry;

/// Keyed async locks
pub mod locks;

/// Prometheus metrics for observability
pub mod metrics;

pub use locks::{KeyedLockGuard, KeyedLocks, LockError};
pub use retry::{RetryPolicy, retry_with_backoff, retry_with_predicate};
