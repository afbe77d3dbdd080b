//! Audit record of one evaluation.
//!
//! Every evaluation that reaches a verdict produces exactly one
//! [`DetectionRecord`]. Records are append-only: a recorder stores them and
//! assigns a [`RecordId`], and nothing ever rewrites a stored record.

use crate::detectors::DetectionFinding;
use crate::geofence::GeofenceResult;
use crate::model::{AttendanceType, LocationSample, UserId, ZoneId};
use crate::policy::{Action, SecurityVerdict};
use crate::risk::RiskAssessment;
use crate::validation::ValidationIssue;
use crate::whitelist::WhitelistMatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier assigned by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Wrap an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an evaluation stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TerminalState {
    /// Matched a trusted entry; detectors skipped.
    Whitelisted {
        /// The entry that matched
        matched: WhitelistMatch,
    },
    /// Failed pre-validation.
    InvalidInput {
        /// What was wrong
        issues: Vec<ValidationIssue>,
    },
    /// The user was inside a block window.
    ActiveBlock {
        /// Time left on the block
        remaining: Duration,
    },
    /// Ran the full analysis.
    Analyzed,
}

impl TerminalState {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Whitelisted { .. } => "whitelisted",
            Self::InvalidInput { .. } => "invalid",
            Self::ActiveBlock { .. } => "blocked",
            Self::Analyzed => "analyzed",
        }
    }
}

/// Everything known about one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Who submitted the sample.
    pub user_id: UserId,
    /// Check-in or check-out.
    pub attendance_type: AttendanceType,
    /// Shift the request was made for, if any.
    pub shift_id: Option<String>,
    /// The submitted sample.
    pub sample: LocationSample,
    /// Per-detector findings; empty for short-circuits.
    pub findings: Vec<DetectionFinding>,
    /// The decision, including the risk assessment and zone match.
    pub verdict: SecurityVerdict,
    /// Where the evaluation stopped.
    pub terminal_state: TerminalState,
    /// Server time of the evaluation.
    pub evaluated_at: DateTime<Utc>,
}

impl DetectionRecord {
    /// Risk assessment behind the verdict.
    #[must_use]
    pub const fn risk_assessment(&self) -> &RiskAssessment {
        &self.verdict.risk_assessment
    }

    /// Zone match behind the verdict.
    #[must_use]
    pub const fn geofence(&self) -> &GeofenceResult {
        &self.verdict.geofence_result
    }

    /// Matched zone, if any.
    #[must_use]
    pub const fn zone_id(&self) -> Option<ZoneId> {
        self.verdict.geofence_result.zone_id
    }

    /// Enforcement action.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.verdict.action
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::policy::PolicyEngine;
    use chrono::TimeZone;

    #[test]
    fn test_record_serializes_terminal_state_tag() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let record = DetectionRecord {
            user_id: UserId::new("u-1"),
            attendance_type: AttendanceType::CheckIn,
            shift_id: None,
            sample: LocationSample::new(-6.2, 106.8, at),
            findings: Vec::new(),
            verdict: PolicyEngine::active_block(Duration::from_secs(600)),
            terminal_state: TerminalState::ActiveBlock {
                remaining: Duration::from_secs(600),
            },
            evaluated_at: at,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["terminal_state"]["state"], "active_block");
        assert_eq!(json["attendance_type"], "check_in");
        assert_eq!(json["verdict"]["action"], "block");
        assert_eq!(record.action(), Action::Block);
        assert_eq!(record.zone_id(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(TerminalState::Analyzed.label(), "analyzed");
        assert_eq!(
            TerminalState::InvalidInput { issues: vec![] }.label(),
            "invalid"
        );
    }
}
