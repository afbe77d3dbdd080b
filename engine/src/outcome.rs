//! Requests and results of [`LocationSecurityEngine::evaluate`](crate::LocationSecurityEngine::evaluate).

use chrono::{DateTime, Utc};
use geoguard_core::detectors::{DetectionFinding, DetectorKind};
use geoguard_core::geofence::GeofenceResult;
use geoguard_core::model::{AttendanceType, LocationSample, UserId, ZoneId};
use geoguard_core::policy::{Action, SecurityVerdict};
use geoguard_core::record::{RecordId, TerminalState};
use geoguard_core::risk::RiskAssessment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One check-in or check-out to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Who is checking in or out.
    pub user_id: UserId,
    /// The submitted fix.
    pub sample: LocationSample,
    /// Check-in or check-out.
    pub attendance_type: AttendanceType,
    /// Shift the request belongs to, for shift-restricted zones.
    pub shift_id: Option<String>,
}

impl EvaluationRequest {
    /// Request without a shift.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, sample: LocationSample, attendance_type: AttendanceType) -> Self {
        Self {
            user_id: user_id.into(),
            sample,
            attendance_type,
            shift_id: None,
        }
    }

    /// Attach a shift id.
    #[must_use]
    pub fn with_shift(mut self, shift_id: impl Into<String>) -> Self {
        self.shift_id = Some(shift_id.into());
        self
    }
}

/// Pipeline stage, used to say where an evaluation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Operator whitelist lookup.
    Whitelist,
    /// Pre-validation of the sample.
    Validation,
    /// Per-user history lock.
    Lock,
    /// Block status, zones, last fix and IP reputation.
    BlockStatus,
    /// Zone resolution.
    Geofence,
    /// Detector pipeline.
    Detection,
    /// Risk aggregation.
    Aggregation,
    /// Policy decision.
    Policy,
}

impl Stage {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Whitelist => "whitelist",
            Self::Validation => "validation",
            Self::Lock => "lock",
            Self::BlockStatus => "block_status",
            Self::Geofence => "geofence",
            Self::Detection => "detection",
            Self::Aggregation => "aggregation",
            Self::Policy => "policy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an evaluation stopped without a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndeterminateReason {
    /// The caller cancelled the token.
    Cancelled,
    /// The caller's deadline passed.
    DeadlineExceeded,
}

/// No verdict could be reached.
///
/// Callers must not grant access on an indeterminate outcome; retry or
/// escalate instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indeterminate {
    /// Stage that was about to run or running.
    pub stage: Stage,
    /// What stopped it.
    pub reason: IndeterminateReason,
}

impl Indeterminate {
    /// Stopped by cancellation.
    #[must_use]
    pub const fn cancelled(stage: Stage) -> Self {
        Self {
            stage,
            reason: IndeterminateReason::Cancelled,
        }
    }

    /// Stopped by the deadline.
    #[must_use]
    pub const fn deadline_exceeded(stage: Stage) -> Self {
        Self {
            stage,
            reason: IndeterminateReason::DeadlineExceeded,
        }
    }
}

impl fmt::Display for Indeterminate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            IndeterminateReason::Cancelled => write!(f, "cancelled during {}", self.stage),
            IndeterminateReason::DeadlineExceeded => {
                write!(f, "deadline exceeded during {}", self.stage)
            }
        }
    }
}

/// A reached verdict and everything behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The decision, embedding the risk assessment and zone match.
    pub verdict: SecurityVerdict,
    /// Per-detector findings in pipeline order; empty for short-circuits.
    pub findings: Vec<DetectionFinding>,
    /// Where the evaluation ended.
    pub terminal_state: TerminalState,
    /// Audit record id, `None` if recording failed.
    pub record_id: Option<RecordId>,
    /// Server time of the evaluation.
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Enforcement action.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.verdict.action
    }

    /// Aggregated risk.
    #[must_use]
    pub const fn assessment(&self) -> &RiskAssessment {
        &self.verdict.risk_assessment
    }

    /// Zone match.
    #[must_use]
    pub const fn geofence(&self) -> &GeofenceResult {
        &self.verdict.geofence_result
    }

    /// Whether the sample counted as inside a zone.
    #[must_use]
    pub const fn within_zone(&self) -> bool {
        self.verdict.geofence_result.within_zone
    }

    /// Closest eligible zone, if any.
    #[must_use]
    pub const fn zone_id(&self) -> Option<ZoneId> {
        self.verdict.geofence_result.zone_id
    }

    /// Distance to the closest eligible zone; infinite without one.
    #[must_use]
    pub const fn distance_meters(&self) -> f64 {
        self.verdict.geofence_result.distance_meters
    }

    /// The finding of a given detector, if it ran.
    #[must_use]
    pub fn finding(&self, detector: DetectorKind) -> Option<&DetectionFinding> {
        self.findings.iter().find(|f| f.detector == detector)
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// A verdict was reached.
    Decided(EvaluationResult),
    /// Cancelled or out of time before the policy decision.
    Indeterminate(Indeterminate),
}

impl EvaluationOutcome {
    /// The result, if decided.
    #[must_use]
    pub const fn decided(&self) -> Option<&EvaluationResult> {
        match self {
            Self::Decided(result) => Some(result),
            Self::Indeterminate(_) => None,
        }
    }

    /// Consume into the result, if decided.
    #[must_use]
    pub fn into_decided(self) -> Option<EvaluationResult> {
        match self {
            Self::Decided(result) => Some(result),
            Self::Indeterminate(_) => None,
        }
    }

    /// `true` for an indeterminate outcome.
    #[must_use]
    pub const fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate(_))
    }

    /// `true` only for a decided `allow`.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Decided(result) if result.verdict.action == Action::Allow)
    }
}
