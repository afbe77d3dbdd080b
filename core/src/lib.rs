//! # GeoGuard Core
//!
//! Pure domain logic for deciding whether an attendance location fix can be
//! trusted.
//!
//! Nothing in this crate performs I/O. Everything that talks to a database,
//! a cache or a notification channel lives behind the provider traits of
//! `geoguard-engine`; this crate only turns values into other values:
//!
//! ```text
//! LocationSample ──► validation ──► geofence ──► detectors ──► RiskAggregator ──► PolicyEngine
//!                                      │              │               │                 │
//!                                 GeofenceResult  DetectionFinding  RiskAssessment  SecurityVerdict
//! ```
//!
//! ## Modules
//!
//! - [`geo`] - Haversine distance and inclusive zone containment
//! - [`model`] - Location samples, device fingerprints, work zones
//! - [`geofence`] - Closest-zone resolution with tolerance and strict zones
//! - [`validation`] - Pre-validation of incoming samples
//! - [`whitelist`] - Operator-configured trusted users, devices, IPs and places
//! - [`detectors`] - The eight independent spoofing detectors
//! - [`risk`] - Weighted aggregation of findings into a risk level
//! - [`policy`] - Decision table from risk level to verdict
//! - [`record`] - The append-only audit record of one evaluation
//! - [`config`] - Strongly typed, validated configuration snapshot
//! - [`environment`] - Clock abstraction

pub mod config;
pub mod detectors;
pub mod environment;
pub mod geo;
pub mod geofence;
pub mod model;
pub mod policy;
pub mod record;
pub mod risk;
pub mod validation;
pub mod whitelist;

// Re-export the types nearly every caller needs
pub use config::{ConfigError, EngineConfig};
pub use detectors::{DetectionContext, DetectionFinding, Detector, DetectorKind, DetectorPipeline};
pub use geofence::GeofenceResult;
pub use model::{
    AttendanceType, Coordinate, DeviceFingerprint, LocationSample, NetworkInfo, UserId, WorkZone,
    ZoneId,
};
pub use policy::{Action, PolicyEngine, SecurityVerdict};
pub use record::{DetectionRecord, RecordId, TerminalState};
pub use risk::{RiskAggregator, RiskAssessment, RiskLevel};
