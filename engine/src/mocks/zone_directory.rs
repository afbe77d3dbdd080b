//! Mock work zone directory for testing.

use super::{Fault, poisoned};
use crate::error::Result;
use crate::providers::WorkZoneDirectory;
use geoguard_core::model::{WorkZone, ZoneId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock zone directory.
///
/// Holds all zones, active or not, and answers with the active ones.
#[derive(Debug, Clone, Default)]
pub struct MockZoneDirectory {
    zones: Arc<Mutex<Vec<WorkZone>>>,
    fault: Arc<Mutex<Fault>>,
    calls: Arc<AtomicUsize>,
}

impl MockZoneDirectory {
    /// Directory with no zones.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding `zones`.
    #[must_use]
    pub fn with_zones(zones: Vec<WorkZone>) -> Self {
        Self {
            zones: Arc::new(Mutex::new(zones)),
            ..Self::default()
        }
    }

    /// Replace every zone.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_zones(&self, zones: Vec<WorkZone>) -> Result<()> {
        *self.zones.lock().map_err(|_| poisoned())? = zones;
        Ok(())
    }

    /// Flip a zone to inactive, as an admin would.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn deactivate(&self, id: ZoneId) -> Result<()> {
        let mut zones = self.zones.lock().map_err(|_| poisoned())?;
        for zone in zones.iter_mut().filter(|z| z.id == id) {
            zone.is_active = false;
        }
        Ok(())
    }

    /// Set the fault applied to every read.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_fault(&self, fault: Fault) -> Result<()> {
        *self.fault.lock().map_err(|_| poisoned())? = fault;
        Ok(())
    }

    /// Number of reads so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WorkZoneDirectory for MockZoneDirectory {
    async fn active_zones(&self) -> Result<Vec<WorkZone>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fault = *self.fault.lock().map_err(|_| poisoned())?;
        fault.apply("zone directory").await?;

        let zones = self.zones.lock().map_err(|_| poisoned())?;
        Ok(zones.iter().filter(|z| z.is_active).cloned().collect())
    }
}
