//! Detection recorder trait.

use crate::error::Result;
use geoguard_core::record::{DetectionRecord, RecordId};
use std::future::Future;

/// Append-only sink for evaluation records.
///
/// Implementations must never update or delete a stored record.
pub trait DetectionRecorder: Send + Sync {
    /// Persist `record` and return its identifier.
    ///
    /// # Errors
    ///
    /// Returns error if the record could not be stored.
    fn record(&self, record: &DetectionRecord) -> impl Future<Output = Result<RecordId>> + Send;
}
