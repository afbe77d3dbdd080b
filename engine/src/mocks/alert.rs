//! Mock alert dispatcher for testing.

use super::{Fault, poisoned};
use crate::error::Result;
use crate::providers::AlertDispatcher;
use geoguard_core::model::UserId;
use geoguard_core::policy::{Action, SecurityVerdict};
use geoguard_core::record::{DetectionRecord, RecordId};
use std::sync::{Arc, Mutex};

/// One captured alert.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedAlert {
    /// User the alert is about.
    pub user_id: UserId,
    /// Action of the verdict.
    pub action: Action,
    /// Reason shown to the user.
    pub reason: String,
    /// Record id, if the record was stored.
    pub record_id: Option<RecordId>,
}

/// Mock alert dispatcher.
///
/// Captures dispatched alerts for inspection.
#[derive(Debug, Clone, Default)]
pub struct MockAlertDispatcher {
    alerts: Arc<Mutex<Vec<DispatchedAlert>>>,
    fault: Arc<Mutex<Fault>>,
}

impl MockAlertDispatcher {
    /// Create a dispatcher with nothing captured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fault applied to every dispatch.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_fault(&self, fault: Fault) -> Result<()> {
        *self.fault.lock().map_err(|_| poisoned())? = fault;
        Ok(())
    }

    /// Copy of everything dispatched so far.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn alerts(&self) -> Result<Vec<DispatchedAlert>> {
        Ok(self.alerts.lock().map_err(|_| poisoned())?.clone())
    }

    /// Number of dispatched alerts.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn count(&self) -> Result<usize> {
        Ok(self.alerts.lock().map_err(|_| poisoned())?.len())
    }
}

impl AlertDispatcher for MockAlertDispatcher {
    async fn dispatch(
        &self,
        user_id: &UserId,
        verdict: &SecurityVerdict,
        _record: &DetectionRecord,
        record_id: Option<&RecordId>,
    ) -> Result<()> {
        let fault = *self.fault.lock().map_err(|_| poisoned())?;
        fault.apply("alert dispatcher").await?;

        self.alerts.lock().map_err(|_| poisoned())?.push(DispatchedAlert {
            user_id: user_id.clone(),
            action: verdict.action,
            reason: verdict.reason.clone(),
            record_id: record_id.cloned(),
        });
        Ok(())
    }
}
