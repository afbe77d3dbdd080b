//! Error types for the location security engine.
//!
//! Business outcomes (blocked, flagged, invalid input) are never errors;
//! they are carried by the verdict. What remains here are contract
//! violations, which the caller must fix, and infrastructure failures,
//! which the engine absorbs with a per-dependency fallback.

use geoguard_core::config::ConfigError;
use thiserror::Error;

/// Result type alias for engine and provider operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy for the engine and its providers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    // ═══════════════════════════════════════════════════════════
    // Contract Violations
    // ═══════════════════════════════════════════════════════════

    /// The configuration snapshot failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    /// A required collaborator or its settings are missing.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// The detector pipeline is empty.
    #[error("No detectors configured")]
    NoDetectors,

    // ═══════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════

    /// A backing store rejected or failed an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A dependency did not answer within its bound.
    #[error("Timed out waiting for {dependency}")]
    Timeout {
        /// Name of the dependency
        dependency: String,
    },

    /// A dependency is unreachable.
    #[error("Dependency unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ═══════════════════════════════════════════════════════════
    // Concurrency
    // ═══════════════════════════════════════════════════════════

    /// The per-user history lock stayed contended.
    #[error("History lock contended for user {user_id}")]
    LockContention {
        /// User whose lock was contended
        user_id: String,
    },
}

impl EngineError {
    /// Returns `true` for deployment or configuration bugs.
    ///
    /// # Examples
    ///
    /// ```
    /// # use geoguard_engine::EngineError;
    /// assert!(EngineError::NoDetectors.is_contract_violation());
    /// assert!(!EngineError::Unavailable("redis".into()).is_contract_violation());
    /// ```
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::MissingDependency(_) | Self::NoDetectors
        )
    }

    /// Returns `true` if retrying the operation later may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use geoguard_engine::EngineError;
    /// let err = EngineError::Timeout { dependency: "history".into() };
    /// assert!(err.is_transient());
    /// assert!(!EngineError::Serialization("bad json".into()).is_transient());
    /// ```
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Unavailable(_) | Self::Storage(_) | Self::LockContention { .. }
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
