//! Mock IP reputation service for testing.

use super::{Fault, poisoned};
use crate::error::Result;
use crate::providers::IpReputation;
use geoguard_core::detectors::ReputationSignal;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// Mock reputation service.
///
/// Addresses are clean unless listed with [`deny`](Self::deny).
#[derive(Debug, Clone, Default)]
pub struct MockIpReputation {
    denied: Arc<Mutex<HashMap<IpAddr, String>>>,
    fault: Arc<Mutex<Fault>>,
}

impl MockIpReputation {
    /// Create a service where every address is clean.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `ip` as denylisted.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn deny(&self, ip: IpAddr, reason: impl Into<String>) -> Result<()> {
        self.denied
            .lock()
            .map_err(|_| poisoned())?
            .insert(ip, reason.into());
        Ok(())
    }

    /// Set the fault applied to every lookup.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_fault(&self, fault: Fault) -> Result<()> {
        *self.fault.lock().map_err(|_| poisoned())? = fault;
        Ok(())
    }
}

impl IpReputation for MockIpReputation {
    async fn lookup(&self, ip: IpAddr) -> Result<ReputationSignal> {
        let fault = *self.fault.lock().map_err(|_| poisoned())?;
        fault.apply("ip reputation").await?;

        let denied = self.denied.lock().map_err(|_| poisoned())?;
        Ok(denied
            .get(&ip)
            .map_or_else(ReputationSignal::clean, ReputationSignal::denylisted))
    }
}
