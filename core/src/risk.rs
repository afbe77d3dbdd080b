//! Risk aggregation.
//!
//! Turns detector findings, plus any penalty terms the orchestrator adds
//! (the outside-zone penalty), into a [`RiskAssessment`].
//!
//! Contributions are summed in canonical detector order whatever order the
//! findings arrive in, so the score is bit-identical across runs.

use crate::config::{DetectionWeights, EngineConfig, RiskThresholds};
use crate::detectors::{DetectionFinding, DetectorKind};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Name of the outside-zone penalty term.
pub const OUTSIDE_ZONE: &str = "outside_zone";

/// Ordered risk category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Below the medium threshold.
    Low,
    /// At least the medium threshold.
    Medium,
    /// At least the high threshold.
    High,
    /// At least the critical threshold.
    Critical,
}

impl RiskLevel {
    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named score added on top of detector contributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyTerm {
    /// Term name, used as the factor prefix.
    pub name: String,
    /// Points added to the total.
    pub score: f64,
    /// Human-readable reason.
    pub reason: String,
}

impl PenaltyTerm {
    /// The outside-zone penalty.
    #[must_use]
    pub fn outside_zone(score: f64, reason: impl Into<String>) -> Self {
        Self {
            name: OUTSIDE_ZONE.to_string(),
            score,
            reason: reason.into(),
        }
    }
}

/// Aggregate of all findings for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Sum of weighted contributions and penalties.
    pub total_score: f64,
    /// Category of `total_score`.
    pub risk_level: RiskLevel,
    /// `"{name}: {evidence}"` for every triggered finding, then every penalty.
    pub contributing_factors: Vec<String>,
    /// Weighted mean confidence of triggered findings, 1.0 when none fired.
    pub confidence: f64,
}

impl RiskAssessment {
    /// Assessment for an evaluation that never reached the detectors.
    #[must_use]
    pub const fn not_analyzed(risk_level: RiskLevel) -> Self {
        Self {
            total_score: 0.0,
            risk_level,
            contributing_factors: Vec::new(),
            confidence: 1.0,
        }
    }

    /// Attach a factor explaining a short-circuit.
    #[must_use]
    pub fn with_factor(mut self, factor: impl Into<String>) -> Self {
        self.contributing_factors.push(factor.into());
        self
    }
}

/// Combines findings into a [`RiskAssessment`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAggregator {
    thresholds: RiskThresholds,
}

impl RiskAggregator {
    /// Aggregator with explicit thresholds.
    #[must_use]
    pub const fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// Aggregator using the configured thresholds.
    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.thresholds)
    }

    /// Map a score to a level. Ties go to the higher level.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoguard_core::config::RiskThresholds;
    /// use geoguard_core::risk::{RiskAggregator, RiskLevel};
    ///
    /// let aggregator = RiskAggregator::new(RiskThresholds::default());
    /// assert_eq!(aggregator.level_for(39.9), RiskLevel::Low);
    /// assert_eq!(aggregator.level_for(40.0), RiskLevel::Medium);
    /// assert_eq!(aggregator.level_for(90.0), RiskLevel::Critical);
    /// ```
    #[must_use]
    pub fn level_for(&self, score: f64) -> RiskLevel {
        if score >= self.thresholds.critical {
            RiskLevel::Critical
        } else if score >= self.thresholds.high {
            RiskLevel::High
        } else if score >= self.thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Aggregate findings and penalty terms.
    ///
    /// Each triggered finding contributes `weights[detector] * confidence`;
    /// untriggered findings contribute nothing. Factors follow the order of
    /// `findings`, then the order of `penalties`.
    #[must_use]
    pub fn aggregate(
        &self,
        findings: &[DetectionFinding],
        weights: &DetectionWeights,
        penalties: &[PenaltyTerm],
    ) -> RiskAssessment {
        let mut contributions: SmallVec<[(DetectorKind, f64, f64); 8]> = findings
            .iter()
            .filter(|f| f.triggered)
            .map(|f| {
                (
                    f.detector,
                    weights.weight_for(f.detector) * f.confidence,
                    f.confidence,
                )
            })
            .collect();
        contributions.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let detector_score = contributions.iter().fold(0.0, |acc, (_, w, _)| acc + w);
        let total_score = penalties
            .iter()
            .fold(detector_score, |acc, term| acc + term.score);

        let confidence = overall_confidence(&contributions);

        let mut contributing_factors: Vec<String> = findings
            .iter()
            .filter(|f| f.triggered)
            .map(|f| format!("{}: {}", f.detector, f.evidence_text()))
            .collect();
        contributing_factors.extend(
            penalties
                .iter()
                .map(|term| format!("{}: {}", term.name, term.reason)),
        );

        RiskAssessment {
            total_score,
            risk_level: self.level_for(total_score),
            contributing_factors,
            confidence,
        }
    }
}

fn overall_confidence(contributions: &[(DetectorKind, f64, f64)]) -> f64 {
    if contributions.is_empty() {
        return 1.0;
    }
    let weight_sum = contributions.iter().fold(0.0, |acc, (_, w, _)| acc + w);
    if weight_sum > 0.0 {
        contributions.iter().map(|(_, w, c)| w * c).sum::<f64>() / weight_sum
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = contributions.len() as f64;
        contributions.iter().map(|(_, _, c)| *c).sum::<f64>() / n
    }
}
