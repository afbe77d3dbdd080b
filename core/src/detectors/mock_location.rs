//! Mock location provider detection.

use super::{DetectionContext, DetectionFinding, Detector, DetectorKind};
use crate::model::LocationSample;

/// Confidence when the device or the provider tag confirms a mock source.
pub const CONFIRMED_CONFIDENCE: f64 = 0.8;

/// Confidence when only the accuracy looks synthetic.
pub const ACCURACY_ONLY_CONFIDENCE: f64 = 0.5;

/// Flags samples coming from a mock location provider.
///
/// Fires when the fingerprint reports mock locations enabled, when the
/// provider tag is `mock`, or when the accuracy is better than any real
/// receiver delivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockLocationDetector;

impl Detector for MockLocationDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::MockLocation
    }

    fn detect(&self, sample: &LocationSample, ctx: &DetectionContext<'_>) -> DetectionFinding {
        let kind = self.kind();
        let min_accuracy = ctx.config.mock_location.min_accuracy_meters;
        let mut evidence = Vec::new();
        let mut confirmed = false;

        if sample
            .device_fingerprint
            .as_ref()
            .is_some_and(|fp| fp.mock_location_enabled)
        {
            evidence.push("device reports mock locations enabled".to_string());
            confirmed = true;
        }

        if let Some(provider) = sample.provider.as_deref() {
            if provider.trim().eq_ignore_ascii_case("mock") {
                evidence.push(format!("location provider is '{provider}'"));
                confirmed = true;
            }
        }

        if let Some(accuracy) = sample.accuracy_meters {
            if accuracy < min_accuracy {
                evidence.push(format!(
                    "accuracy {accuracy} m is better than the {min_accuracy} m a real receiver reports"
                ));
            }
        }

        if evidence.is_empty() {
            let nothing_to_check = sample.device_fingerprint.is_none()
                && sample.provider.is_none()
                && sample.accuracy_meters.is_none();
            return if nothing_to_check {
                DetectionFinding::insufficient_data(kind)
            } else {
                DetectionFinding::clear(kind, "no mock location indicators")
            };
        }

        let confidence = if confirmed {
            CONFIRMED_CONFIDENCE
        } else {
            ACCURACY_ONLY_CONFIDENCE
        };
        let finding = DetectionFinding::triggered(kind, confidence, evidence);
        match sample.accuracy_meters {
            Some(accuracy) => finding.with_metric("accuracy_meters", accuracy),
            None => finding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::detectors::{HistoryContext, INSUFFICIENT_DATA};
    use crate::model::DeviceFingerprint;
    use chrono::Utc;

    fn run(sample: &LocationSample) -> DetectionFinding {
        let config = EngineConfig::default();
        let ctx = DetectionContext::new(&config, HistoryContext::FirstObservation);
        MockLocationDetector.detect(sample, &ctx)
    }

    fn base() -> LocationSample {
        LocationSample::new(-6.2, 106.8, Utc::now())
    }

    #[test]
    fn test_accuracy_only() {
        let finding = run(&base().with_accuracy(1.0));
        assert!(finding.triggered);
        assert_eq!(finding.confidence, ACCURACY_ONLY_CONFIDENCE);
        assert_eq!(finding.raw_metrics.get("accuracy_meters"), Some(&1.0));
    }

    #[test]
    fn test_fingerprint_confirmed() {
        let fp = DeviceFingerprint {
            mock_location_enabled: true,
            ..DeviceFingerprint::default()
        };
        let finding = run(&base().with_accuracy(1.0).with_fingerprint(fp));
        assert!(finding.triggered);
        assert_eq!(finding.confidence, CONFIRMED_CONFIDENCE);
        assert_eq!(finding.evidence.len(), 2);
    }

    #[test]
    fn test_mock_provider_tag_is_confirmed() {
        let finding = run(&base().with_accuracy(12.0).with_provider("MOCK"));
        assert!(finding.triggered);
        assert_eq!(finding.confidence, CONFIRMED_CONFIDENCE);
    }

    #[test]
    fn test_boundary_accuracy_is_not_too_perfect() {
        let finding = run(&base().with_accuracy(5.0));
        assert!(!finding.triggered);
    }

    #[test]
    fn test_no_inputs() {
        let finding = run(&base());
        assert!(!finding.triggered);
        assert_eq!(finding.evidence, vec![INSUFFICIENT_DATA]);
    }
}
