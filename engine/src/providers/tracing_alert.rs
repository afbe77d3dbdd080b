//! Logging alert dispatcher for development and as a fallback.

use crate::error::Result;
use crate::providers::AlertDispatcher;
use geoguard_core::model::UserId;
use geoguard_core::policy::{Action, SecurityVerdict};
use geoguard_core::record::{DetectionRecord, RecordId};
use tracing::{info, warn};

/// Alert dispatcher that writes escalations to the log.
///
/// Blocks are logged at `warn`, everything else at `info`.
///
/// # Examples
///
/// ```ignore
/// use geoguard_engine::providers::TracingAlertDispatcher;
///
/// let alerts = TracingAlertDispatcher::new();
/// alerts.dispatch(&user_id, &verdict, &record, Some(&record_id)).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct TracingAlertDispatcher;

impl TracingAlertDispatcher {
    /// Create a new logging dispatcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AlertDispatcher for TracingAlertDispatcher {
    async fn dispatch(
        &self,
        user_id: &UserId,
        verdict: &SecurityVerdict,
        record: &DetectionRecord,
        record_id: Option<&RecordId>,
    ) -> Result<()> {
        let record_id = record_id.map_or("unrecorded", RecordId::as_str);
        let factors = verdict.risk_assessment.contributing_factors.join(" | ");

        if verdict.action == Action::Block {
            warn!(
                user_id = %user_id,
                record_id,
                attendance = %record.attendance_type,
                risk_level = %verdict.risk_assessment.risk_level,
                score = verdict.risk_assessment.total_score,
                block_secs = verdict.block_duration.as_secs(),
                factors = %factors,
                "Location security alert: {}",
                verdict.reason
            );
        } else {
            info!(
                user_id = %user_id,
                record_id,
                attendance = %record.attendance_type,
                action = %verdict.action,
                risk_level = %verdict.risk_assessment.risk_level,
                score = verdict.risk_assessment.total_score,
                factors = %factors,
                "Location flagged for review: {}",
                verdict.reason
            );
        }

        Ok(())
    }
}
