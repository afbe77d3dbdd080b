//! Enforcement policy.
//!
//! A fixed decision table from risk level and zone containment to a
//! [`SecurityVerdict`]:
//!
//! | risk level | within zone | action | review | block |
//! |---|---|---|---|---|
//! | critical | any | block | yes | `critical_block_hours` |
//! | high | any | flag | yes | - |
//! | medium | any | warn | no | - |
//! | low | no | warn | no | - |
//! | low | yes | allow | no | - |
//!
//! With `auto_block_on_critical` off, critical is flagged like high.
//!
//! The short-circuit verdicts (whitelisted, invalid input, active block) are
//! built by the constructors on [`PolicyEngine`] and never go through the
//! table.

use crate::config::PolicyConfig;
use crate::geofence::GeofenceResult;
use crate::risk::{RiskAssessment, RiskLevel};
use crate::validation::{describe_issues, ValidationIssue};
use crate::whitelist::WhitelistMatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Enforcement action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Accept the attendance.
    Allow,
    /// Accept with a warning.
    Warn,
    /// Accept but queue for human review.
    Flag,
    /// Reject.
    Block,
}

impl Action {
    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Warn => "warn",
            Self::Flag => "flag",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final decision for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityVerdict {
    /// What to do with the attendance.
    pub action: Action,
    /// Whether a human must look at it.
    pub requires_human_review: bool,
    /// Block length; zero unless `action` is [`Action::Block`].
    pub block_duration: Duration,
    /// Message suitable for display to the user.
    pub reason: String,
    /// Risk behind the decision.
    pub risk_assessment: RiskAssessment,
    /// Zone match behind the decision.
    pub geofence_result: GeofenceResult,
}

impl SecurityVerdict {
    /// Whether the alert dispatcher must be notified.
    #[must_use]
    pub fn requires_escalation(&self) -> bool {
        self.requires_human_review || matches!(self.action, Action::Flag | Action::Block)
    }
}

/// Decision table plus the short-circuit verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    /// Policy with the given settings.
    #[must_use]
    pub const fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Apply the decision table.
    #[must_use]
    pub fn decide(&self, assessment: RiskAssessment, geofence: GeofenceResult) -> SecurityVerdict {
        let (action, requires_human_review, block_duration, reason) =
            match (assessment.risk_level, geofence.within_zone) {
                (RiskLevel::Critical, _) if self.config.auto_block_on_critical => {
                    let duration = self.config.critical_block_duration();
                    (
                        Action::Block,
                        true,
                        duration,
                        format!(
                            "Critical location risk detected. Attendance is blocked for {} hours pending review.",
                            self.config.critical_block_hours
                        ),
                    )
                }
                (RiskLevel::Critical, _) => (
                    Action::Flag,
                    true,
                    Duration::ZERO,
                    "Critical location risk detected. Attendance is flagged for review.".to_string(),
                ),
                (RiskLevel::High, _) => (
                    Action::Flag,
                    true,
                    Duration::ZERO,
                    "High location risk detected. Attendance is flagged for review.".to_string(),
                ),
                (RiskLevel::Medium, _) => (
                    Action::Warn,
                    false,
                    Duration::ZERO,
                    "Suspicious location signals detected. Attendance accepted with a warning."
                        .to_string(),
                ),
                (RiskLevel::Low, false) => (
                    Action::Warn,
                    false,
                    Duration::ZERO,
                    match geofence.outside_reason() {
                        Some(detail) => {
                            format!("Location is outside the authorized work zone: {detail}.")
                        }
                        None => "Location is outside the authorized work zone.".to_string(),
                    },
                ),
                (RiskLevel::Low, true) => (
                    Action::Allow,
                    false,
                    Duration::ZERO,
                    "Location verified.".to_string(),
                ),
            };

        SecurityVerdict {
            action,
            requires_human_review,
            block_duration,
            reason,
            risk_assessment: assessment,
            geofence_result: geofence,
        }
    }

    /// Verdict for a whitelisted request: allow, risk forced to low.
    #[must_use]
    pub fn whitelisted(matched: &WhitelistMatch) -> SecurityVerdict {
        SecurityVerdict {
            action: Action::Allow,
            requires_human_review: false,
            block_duration: Duration::ZERO,
            reason: "Location accepted: trusted entry.".to_string(),
            risk_assessment: RiskAssessment::not_analyzed(RiskLevel::Low)
                .with_factor(format!("whitelist: {matched}")),
            geofence_result: GeofenceResult::not_evaluated(),
        }
    }

    /// Verdict for a sample that failed pre-validation.
    ///
    /// Blocks the attempt and asks for review, but sets no block window.
    #[must_use]
    pub fn invalid_input(issues: &[ValidationIssue]) -> SecurityVerdict {
        let reason = describe_issues(issues);
        SecurityVerdict {
            action: Action::Block,
            requires_human_review: true,
            block_duration: Duration::ZERO,
            risk_assessment: RiskAssessment::not_analyzed(RiskLevel::Critical)
                .with_factor(format!("invalid_input: {reason}")),
            reason,
            geofence_result: GeofenceResult::not_evaluated(),
        }
    }

    /// Verdict for a user inside an active block window.
    #[must_use]
    pub fn active_block(remaining: Duration) -> SecurityVerdict {
        let minutes = remaining.as_secs().div_ceil(60);
        SecurityVerdict {
            action: Action::Block,
            requires_human_review: true,
            block_duration: remaining,
            reason: format!(
                "Attendance is blocked after a previous security violation. Try again in {minutes} minutes."
            ),
            risk_assessment: RiskAssessment::not_analyzed(RiskLevel::Critical)
                .with_factor(format!("active_block: {minutes} minutes remaining")),
            geofence_result: GeofenceResult::not_evaluated(),
        }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}
