//! IP reputation lookup.

use crate::error::Result;
use geoguard_core::detectors::ReputationSignal;
use std::future::Future;
use std::net::IpAddr;

/// External IP reputation service.
///
/// Resolved by the engine before the detectors run and handed to the
/// network reputation detector through the detection context.
pub trait IpReputation: Send + Sync {
    /// Reputation of `ip`.
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable. The engine then runs the
    /// detectors without a reputation signal.
    fn lookup(&self, ip: IpAddr) -> impl Future<Output = Result<ReputationSignal>> + Send;
}

/// Reputation source that knows nothing; every address is clean.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIpReputation;

impl IpReputation for NoIpReputation {
    async fn lookup(&self, _ip: IpAddr) -> Result<ReputationSignal> {
        Ok(ReputationSignal::clean())
    }
}
