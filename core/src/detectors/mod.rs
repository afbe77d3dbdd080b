//! Spoofing detectors.
//!
//! Each detector looks at one family of indicators and produces a single
//! [`DetectionFinding`]. Detectors only see the sample and a read-only
//! [`DetectionContext`]; they never see each other's output, so the
//! pipeline can run them in any order and get the same findings.
//!
//! A detector never fails. Missing inputs produce a not-triggered finding
//! with the evidence `"insufficient data"`.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use geoguard_core::config::EngineConfig;
//! use geoguard_core::detectors::{DetectionContext, DetectorKind, DetectorPipeline, HistoryContext};
//! use geoguard_core::model::LocationSample;
//!
//! let config = EngineConfig::default();
//! let pipeline = DetectorPipeline::standard();
//! let ctx = DetectionContext::new(&config, HistoryContext::FirstObservation);
//!
//! let findings = pipeline.run(&LocationSample::new(0.0, 0.0, Utc::now()), &ctx);
//! let coords = findings
//!     .iter()
//!     .find(|f| f.detector == DetectorKind::CoordinateAnomaly)
//!     .unwrap();
//! assert!(coords.triggered);
//! ```

mod coordinate_anomaly;
mod developer_mode;
mod device_integrity;
mod fake_gps;
mod gps_accuracy;
mod impossible_travel;
mod mock_location;
mod network;

pub use coordinate_anomaly::CoordinateAnomalyDetector;
pub use developer_mode::DeveloperModeDetector;
pub use device_integrity::DeviceIntegrityDetector;
pub use fake_gps::FakeGpsAppDetector;
pub use gps_accuracy::GpsAccuracyDetector;
pub use impossible_travel::{FIRST_OBSERVATION, ImpossibleTravelDetector, NO_ELAPSED_TIME};
pub use mock_location::MockLocationDetector;
pub use network::{NetworkReputationDetector, ReputationSignal};

use crate::config::{DetectionWeights, EngineConfig};
use crate::model::{LastKnownFix, LocationSample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Evidence used when a detector lacks the inputs it needs.
pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// Identity of a detector.
///
/// The declaration order is the canonical order: findings are reported,
/// and contributions summed, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// [`MockLocationDetector`]
    MockLocation,
    /// [`FakeGpsAppDetector`]
    FakeGpsApp,
    /// [`DeveloperModeDetector`]
    DeveloperMode,
    /// [`ImpossibleTravelDetector`]
    ImpossibleTravel,
    /// [`CoordinateAnomalyDetector`]
    CoordinateAnomaly,
    /// [`DeviceIntegrityDetector`]
    DeviceIntegrity,
    /// [`GpsAccuracyDetector`]
    GpsAccuracy,
    /// [`NetworkReputationDetector`]
    NetworkReputation,
}

impl DetectorKind {
    /// Every detector, in canonical order.
    pub const ALL: [Self; 8] = [
        Self::MockLocation,
        Self::FakeGpsApp,
        Self::DeveloperMode,
        Self::ImpossibleTravel,
        Self::CoordinateAnomaly,
        Self::DeviceIntegrity,
        Self::GpsAccuracy,
        Self::NetworkReputation,
    ];

    /// Stable snake-case name, used in factors, metrics and weights.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MockLocation => "mock_location",
            Self::FakeGpsApp => "fake_gps_app",
            Self::DeveloperMode => "developer_mode",
            Self::ImpossibleTravel => "impossible_travel",
            Self::CoordinateAnomaly => "coordinate_anomaly",
            Self::DeviceIntegrity => "device_integrity",
            Self::GpsAccuracy => "gps_accuracy",
            Self::NetworkReputation => "network_reputation",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of one detector for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFinding {
    /// Which detector produced this.
    pub detector: DetectorKind,
    /// Whether the indicator fired.
    pub triggered: bool,
    /// How sure the detector is, 0..=1.
    pub confidence: f64,
    /// `weight * confidence` when triggered, else 0. Set by the pipeline.
    pub weight_contribution: f64,
    /// Human-readable indicators, in the order they were checked.
    pub evidence: Vec<String>,
    /// Numbers behind the decision (`speed_kmh`, `distance_m`, ...).
    pub raw_metrics: BTreeMap<String, f64>,
}

impl DetectionFinding {
    /// A finding that fired.
    #[must_use]
    pub fn triggered(detector: DetectorKind, confidence: f64, evidence: Vec<String>) -> Self {
        Self {
            detector,
            triggered: true,
            confidence: confidence.clamp(0.0, 1.0),
            weight_contribution: 0.0,
            evidence,
            raw_metrics: BTreeMap::new(),
        }
    }

    /// A finding that did not fire.
    #[must_use]
    pub fn clear(detector: DetectorKind, evidence: impl Into<String>) -> Self {
        Self {
            detector,
            triggered: false,
            confidence: 0.0,
            weight_contribution: 0.0,
            evidence: vec![evidence.into()],
            raw_metrics: BTreeMap::new(),
        }
    }

    /// A detector could not run for lack of inputs.
    #[must_use]
    pub fn insufficient_data(detector: DetectorKind) -> Self {
        Self::clear(detector, INSUFFICIENT_DATA)
    }

    /// Attach a raw metric.
    #[must_use]
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.raw_metrics.insert(name.to_string(), value);
        self
    }

    /// Evidence joined into a single line.
    #[must_use]
    pub fn evidence_text(&self) -> String {
        self.evidence.join("; ")
    }
}

/// What the history store knew about the user's previous fix.
#[derive(Debug, Clone, Copy)]
pub enum HistoryContext<'a> {
    /// The store was unreachable or the per-user lock was contended.
    Unavailable,
    /// The store has nothing for this user.
    FirstObservation,
    /// The user's last stored fix.
    Previous(&'a LastKnownFix),
}

/// Read-only inputs shared by all detectors in one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    /// Configuration snapshot.
    pub config: &'a EngineConfig,
    /// Previous fix for impossible travel.
    pub history: HistoryContext<'a>,
    /// IP reputation resolved ahead of the detectors, if any.
    pub ip_reputation: Option<&'a ReputationSignal>,
}

impl<'a> DetectionContext<'a> {
    /// Context without an IP reputation signal.
    #[must_use]
    pub const fn new(config: &'a EngineConfig, history: HistoryContext<'a>) -> Self {
        Self {
            config,
            history,
            ip_reputation: None,
        }
    }

    /// Attach an IP reputation signal.
    #[must_use]
    pub const fn with_ip_reputation(mut self, signal: Option<&'a ReputationSignal>) -> Self {
        self.ip_reputation = signal;
        self
    }
}

/// A single spoofing detector.
pub trait Detector: Send + Sync {
    /// Which detector this is.
    fn kind(&self) -> DetectorKind;

    /// Inspect a sample. Never fails.
    fn detect(&self, sample: &LocationSample, ctx: &DetectionContext<'_>) -> DetectionFinding;
}

/// Ordered set of detectors.
pub struct DetectorPipeline {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorPipeline {
    /// Empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// All eight detectors in canonical order.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_detector(MockLocationDetector)
            .with_detector(FakeGpsAppDetector)
            .with_detector(DeveloperModeDetector)
            .with_detector(ImpossibleTravelDetector)
            .with_detector(CoordinateAnomalyDetector)
            .with_detector(DeviceIntegrityDetector)
            .with_detector(GpsAccuracyDetector)
            .with_detector(NetworkReputationDetector)
    }

    /// Append a detector.
    #[must_use]
    pub fn with_detector(mut self, detector: impl Detector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    /// Number of detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// `true` when no detector is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run every detector and stamp its weight contribution.
    #[must_use]
    pub fn run(&self, sample: &LocationSample, ctx: &DetectionContext<'_>) -> Vec<DetectionFinding> {
        self.detectors
            .iter()
            .map(|detector| {
                let finding = detector.detect(sample, ctx);
                let finding = stamp_weight(finding, &ctx.config.weights);
                if finding.triggered {
                    tracing::debug!(
                        detector = %finding.detector,
                        confidence = finding.confidence,
                        evidence = %finding.evidence_text(),
                        "Detector triggered"
                    );
                }
                finding
            })
            .collect()
    }
}

impl Default for DetectorPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for DetectorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.detectors.iter().map(|d| d.kind()))
            .finish()
    }
}

fn stamp_weight(mut finding: DetectionFinding, weights: &DetectionWeights) -> DetectionFinding {
    finding.weight_contribution = if finding.triggered {
        weights.weight_for(finding.detector) * finding.confidence
    } else {
        0.0
    };
    finding
}

/// Highest confidence among the signals that fired.
fn max_confidence(signals: &[(f64, String)]) -> f64 {
    signals.iter().map(|(c, _)| *c).fold(0.0, f64::max)
}

/// Build a triggered finding from `(confidence, evidence)` pairs, or a clear
/// one with `clear_evidence` when none fired.
fn from_signals(
    kind: DetectorKind,
    signals: Vec<(f64, String)>,
    clear_evidence: &str,
) -> DetectionFinding {
    if signals.is_empty() {
        return DetectionFinding::clear(kind, clear_evidence);
    }
    let confidence = max_confidence(&signals);
    DetectionFinding::triggered(kind, confidence, signals.into_iter().map(|(_, e)| e).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::model::{DeviceFingerprint, LocationSample};
    use chrono::{TimeZone, Utc};

    fn sample() -> LocationSample {
        LocationSample::new(-6.2088, 106.8456, Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap())
            .with_accuracy(10.0)
    }

    #[test]
    fn test_standard_pipeline_is_canonical_order() {
        let pipeline = DetectorPipeline::standard();
        assert_eq!(pipeline.len(), 8);
        assert_eq!(format!("{pipeline:?}"), format!("{:?}", DetectorKind::ALL));
    }

    #[test]
    fn test_clean_sample_triggers_nothing() {
        let config = EngineConfig::default();
        let ctx = DetectionContext::new(&config, HistoryContext::FirstObservation);
        let s = sample().with_fingerprint(DeviceFingerprint::default());

        let findings = DetectorPipeline::standard().run(&s, &ctx);
        assert!(findings.iter().all(|f| !f.triggered), "{findings:#?}");
        assert!(findings.iter().all(|f| f.weight_contribution == 0.0));
    }

    #[test]
    fn test_pipeline_stamps_weight_contribution() {
        let config = EngineConfig::default();
        let ctx = DetectionContext::new(&config, HistoryContext::FirstObservation);
        let s = sample().with_fingerprint(DeviceFingerprint {
            is_rooted: true,
            is_emulator: true,
            ..DeviceFingerprint::default()
        });

        let findings = DetectorPipeline::standard().run(&s, &ctx);
        let integrity = findings
            .iter()
            .find(|f| f.detector == DetectorKind::DeviceIntegrity)
            .unwrap();
        assert!(integrity.triggered);
        assert_eq!(integrity.weight_contribution, 35.0 * 0.9);
    }

    #[test]
    fn test_names_match_serde() {
        for kind in DetectorKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }
}
