//! Engine environment.
//!
//! Bundles every collaborator of the [`LocationSecurityEngine`](crate::LocationSecurityEngine)
//! so they can be swapped as one unit: mocks in tests, Redis and PostgreSQL
//! in production.

use crate::providers::{
    AlertDispatcher, DetectionRecorder, HistoryStore, IpReputation, WhitelistChecker,
    WorkZoneDirectory,
};
use geoguard_core::environment::Clock;

/// Engine environment.
///
/// # Type Parameters
///
/// - `Z`: Work zone directory
/// - `H`: History store
/// - `R`: Detection recorder
/// - `A`: Alert dispatcher
/// - `W`: Whitelist checker
/// - `I`: IP reputation service
/// - `C`: Clock
#[derive(Clone)]
pub struct EngineEnvironment<Z, H, R, A, W, I, C>
where
    Z: WorkZoneDirectory + Clone,
    H: HistoryStore + Clone,
    R: DetectionRecorder + Clone,
    A: AlertDispatcher + Clone,
    W: WhitelistChecker + Clone,
    I: IpReputation + Clone,
    C: Clock + Clone,
{
    /// Active work zones (PostgreSQL, usually behind a `CachedZoneDirectory`).
    pub zones: Z,

    /// Last fix and block windows (`Redis`).
    pub history: H,

    /// Append-only audit trail (`PostgreSQL`).
    pub recorder: R,

    /// Escalation channel.
    pub alerts: A,

    /// Operator whitelist.
    pub whitelist: W,

    /// IP reputation lookups.
    pub reputation: I,

    /// Server time source.
    pub clock: C,
}

impl<Z, H, R, A, W, I, C> EngineEnvironment<Z, H, R, A, W, I, C>
where
    Z: WorkZoneDirectory + Clone,
    H: HistoryStore + Clone,
    R: DetectionRecorder + Clone,
    A: AlertDispatcher + Clone,
    W: WhitelistChecker + Clone,
    I: IpReputation + Clone,
    C: Clock + Clone,
{
    /// Create a new engine environment.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        zones: Z,
        history: H,
        recorder: R,
        alerts: A,
        whitelist: W,
        reputation: I,
        clock: C,
    ) -> Self {
        Self {
            zones,
            history,
            recorder,
            alerts,
            whitelist,
            reputation,
            clock,
        }
    }
}
