//! Mock detection recorder for testing.

use super::{Fault, poisoned};
use crate::error::Result;
use crate::providers::DetectionRecorder;
use geoguard_core::record::{DetectionRecord, RecordId};
use std::sync::{Arc, Mutex};

/// Mock recorder.
///
/// Appends to an in-memory list and hands out sequential ids
/// (`rec-1`, `rec-2`, ...). There is deliberately no way to modify a stored
/// record.
#[derive(Debug, Clone, Default)]
pub struct MockDetectionRecorder {
    records: Arc<Mutex<Vec<(RecordId, DetectionRecord)>>>,
    fault: Arc<Mutex<Fault>>,
}

impl MockDetectionRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fault applied to every write.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_fault(&self, fault: Fault) -> Result<()> {
        *self.fault.lock().map_err(|_| poisoned())? = fault;
        Ok(())
    }

    /// Copy of everything stored so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn records(&self) -> Result<Vec<(RecordId, DetectionRecord)>> {
        Ok(self.records.lock().map_err(|_| poisoned())?.clone())
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn count(&self) -> Result<usize> {
        Ok(self.records.lock().map_err(|_| poisoned())?.len())
    }

    /// Most recent record.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn last(&self) -> Result<Option<DetectionRecord>> {
        Ok(self
            .records
            .lock()
            .map_err(|_| poisoned())?
            .last()
            .map(|(_, record)| record.clone()))
    }
}

impl DetectionRecorder for MockDetectionRecorder {
    async fn record(&self, record: &DetectionRecord) -> Result<RecordId> {
        let fault = *self.fault.lock().map_err(|_| poisoned())?;
        fault.apply("detection recorder").await?;

        let mut records = self.records.lock().map_err(|_| poisoned())?;
        let id = RecordId::new(format!("rec-{}", records.len() + 1));
        records.push((id.clone(), record.clone()));
        Ok(id)
    }
}
