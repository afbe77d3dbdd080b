//! Alert dispatcher trait.

use crate::error::Result;
use geoguard_core::model::UserId;
use geoguard_core::policy::SecurityVerdict;
use geoguard_core::record::{DetectionRecord, RecordId};
use std::future::Future;

/// Notified when a verdict needs a human.
///
/// Called for every verdict that requires review or whose action is
/// `flag` or `block`. Delivery (email, push, chat bot) is up to the
/// implementation; failures are logged by the engine and never change the
/// verdict.
pub trait AlertDispatcher: Send + Sync {
    /// Deliver an escalation.
    ///
    /// `record_id` is `None` when the record could not be persisted.
    ///
    /// # Errors
    ///
    /// Returns error if delivery failed.
    fn dispatch(
        &self,
        user_id: &UserId,
        verdict: &SecurityVerdict,
        record: &DetectionRecord,
        record_id: Option<&RecordId>,
    ) -> impl Future<Output = Result<()>> + Send;
}
