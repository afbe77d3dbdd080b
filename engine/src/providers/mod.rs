//! Engine collaborators.
//!
//! Every piece of I/O the engine performs goes through one of these traits.
//! The orchestrator depends on the traits only; the caller picks the
//! implementations when it builds the [`EngineEnvironment`](crate::environment::EngineEnvironment).
//!
//! ```text
//!                      ┌────────────────────────────┐
//!   WhitelistChecker ─►│                            │─► DetectionRecorder (append-only)
//!  WorkZoneDirectory ─►│  LocationSecurityEngine    │─► HistoryStore::update_fix / set_block
//!       HistoryStore ─►│                            │─► AlertDispatcher
//!       IpReputation ─►│                            │
//!                      └────────────────────────────┘
//! ```
//!
//! This enables:
//! - **Testing**: in-memory mocks with fault injection (`mocks`, feature `test-utils`)
//! - **Production**: Redis history, PostgreSQL audit trail and zone table (`stores`)
//! - **Development**: [`TracingAlertDispatcher`] and [`ConfiguredWhitelist`]

pub mod alert;
pub mod history;
pub mod recorder;
pub mod reputation;
pub mod tracing_alert;
pub mod whitelist;
pub mod zone_directory;

// Re-export provider traits
pub use alert::AlertDispatcher;
pub use history::HistoryStore;
pub use recorder::DetectionRecorder;
pub use reputation::{IpReputation, NoIpReputation};
pub use tracing_alert::TracingAlertDispatcher;
pub use whitelist::{ConfiguredWhitelist, WhitelistChecker};
pub use zone_directory::WorkZoneDirectory;
