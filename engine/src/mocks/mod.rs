//! In-memory provider implementations for testing.
//!
//! Every mock keeps its state behind an `Arc`, so a clone handed to the
//! engine and the clone kept by the test observe the same data. Each one can
//! be told to fail or to stall through [`Fault`], which is how the
//! degradation paths of the engine are exercised.

pub mod alert;
pub mod history;
pub mod recorder;
pub mod reputation;
pub mod zone_directory;

pub use alert::{DispatchedAlert, MockAlertDispatcher};
pub use history::MockHistoryStore;
pub use recorder::MockDetectionRecorder;
pub use reputation::MockIpReputation;
pub use zone_directory::MockZoneDirectory;

use crate::error::{EngineError, Result};
use std::time::Duration;

/// Injected misbehaviour for a mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Behave normally.
    #[default]
    None,
    /// Return [`EngineError::Unavailable`].
    Fail,
    /// Sleep before answering normally.
    Delay(Duration),
}

impl Fault {
    /// Apply the fault on behalf of `dependency`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] for [`Fault::Fail`].
    pub async fn apply(self, dependency: &str) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Fail => Err(EngineError::Unavailable(format!("{dependency} (injected)"))),
            Self::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

fn poisoned() -> EngineError {
    EngineError::Storage("Mutex lock failed".to_string())
}
