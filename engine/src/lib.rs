//! # GeoGuard Engine
//!
//! Real-time location integrity and attendance fraud detection.
//!
//! The [`LocationSecurityEngine`] takes one GPS fix submitted at check-in or
//! check-out and returns a [`SecurityVerdict`](geoguard_core::SecurityVerdict)
//! (allow, warn, flag or block) together with the risk assessment and the
//! work zone match behind it. The pure domain logic lives in
//! `geoguard-core`; this crate adds the I/O around it:
//!
//! - **Providers** ([`providers`]): the traits for every collaborator
//! - **Environment** ([`EngineEnvironment`]): the collaborators bundled for injection
//! - **Orchestration** ([`LocationSecurityEngine`]): the per-evaluation pipeline
//! - **Cancellation** ([`EvaluationContext`]): caller deadline and token
//! - **Zone cache** ([`CachedZoneDirectory`]): bounded-staleness zone reads
//! - **Settings** ([`settings`]): configuration from `GEOGUARD_*` variables
//! - **Stores** ([`stores`]): Redis history, PostgreSQL recorder and zones
//! - **Mocks** (`mocks`, feature `test-utils`): in-memory providers with fault injection
//!
//! ## Example
//!
//! ```
//! use geoguard_core::config::EngineConfig;
//! use geoguard_core::environment::SystemClock;
//! use geoguard_core::model::{AttendanceType, Coordinate, LocationSample, WorkZone};
//! use geoguard_engine::mocks::{
//!     MockDetectionRecorder, MockHistoryStore, MockIpReputation, MockZoneDirectory,
//! };
//! use geoguard_engine::providers::{ConfiguredWhitelist, TracingAlertDispatcher};
//! use geoguard_engine::{
//!     CachedZoneDirectory, EngineEnvironment, EvaluationContext, EvaluationRequest,
//!     LocationSecurityEngine,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> geoguard_engine::Result<()> {
//! let config = EngineConfig::default();
//! let clinic = WorkZone::new(1, "Clinic", Coordinate::new(-6.2088, 106.8456), 100.0);
//! let zones =
//!     CachedZoneDirectory::from_config(MockZoneDirectory::with_zones(vec![clinic]), &config);
//! let env = EngineEnvironment::new(
//!     zones,
//!     MockHistoryStore::new(),
//!     MockDetectionRecorder::new(),
//!     TracingAlertDispatcher::new(),
//!     ConfiguredWhitelist::default(),
//!     MockIpReputation::new(),
//!     SystemClock,
//! );
//! let engine = LocationSecurityEngine::new(config, env)?;
//!
//! let sample = LocationSample::new(-6.2088, 106.8456, chrono::Utc::now())
//!     .with_accuracy(12.0)
//!     .with_provider("gps");
//! let request = EvaluationRequest::new("nurse-7", sample, AttendanceType::CheckIn);
//!
//! let outcome = engine.evaluate(&request, &EvaluationContext::new()).await?;
//! assert!(outcome.is_allow());
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod engine;
pub mod environment;
pub mod error;
pub mod outcome;
pub mod providers;
pub mod settings;
pub mod stores;
pub mod zone_cache;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use context::EvaluationContext;
pub use engine::LocationSecurityEngine;
pub use environment::EngineEnvironment;
pub use error::{EngineError, Result};
pub use outcome::{
    EvaluationOutcome, EvaluationRequest, EvaluationResult, Indeterminate, IndeterminateReason,
    Stage,
};
pub use zone_cache::CachedZoneDirectory;
