//! GPS accuracy band check.

use super::{DetectionContext, DetectionFinding, Detector, DetectorKind};
use crate::model::LocationSample;

/// Flags accuracy values outside the plausible band: better than the lower
/// bound is "too perfect", worse than the upper bound is too imprecise to
/// trust. The bounds themselves are inside the band.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpsAccuracyDetector;

impl Detector for GpsAccuracyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::GpsAccuracy
    }

    fn detect(&self, sample: &LocationSample, ctx: &DetectionContext<'_>) -> DetectionFinding {
        let kind = self.kind();
        let Some(accuracy) = sample.accuracy_meters else {
            return DetectionFinding::insufficient_data(kind);
        };
        let band = ctx.config.gps_accuracy;

        let finding = if accuracy < band.min_accuracy_meters {
            DetectionFinding::triggered(
                kind,
                0.6,
                vec![format!(
                    "accuracy {accuracy} m is too perfect (below {} m)",
                    band.min_accuracy_meters
                )],
            )
        } else if accuracy > band.max_accuracy_meters {
            DetectionFinding::triggered(
                kind,
                0.4,
                vec![format!(
                    "accuracy {accuracy} m is too imprecise to trust (above {} m)",
                    band.max_accuracy_meters
                )],
            )
        } else {
            DetectionFinding::clear(kind, "accuracy within plausible band")
        };

        finding.with_metric("accuracy_meters", accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::detectors::{HistoryContext, INSUFFICIENT_DATA};
    use chrono::Utc;

    fn run(accuracy: Option<f64>) -> DetectionFinding {
        let config = EngineConfig::default();
        let ctx = DetectionContext::new(&config, HistoryContext::FirstObservation);
        let mut sample = LocationSample::new(-6.2, 106.8, Utc::now());
        sample.accuracy_meters = accuracy;
        GpsAccuracyDetector.detect(&sample, &ctx)
    }

    #[test]
    fn test_band() {
        assert!(!run(Some(5.0)).triggered);
        assert!(!run(Some(100.0)).triggered);
        assert!(!run(Some(30.0)).triggered);

        let perfect = run(Some(0.5));
        assert!(perfect.triggered);
        assert_eq!(perfect.confidence, 0.6);

        let vague = run(Some(250.0));
        assert!(vague.triggered);
        assert_eq!(vague.confidence, 0.4);
    }

    #[test]
    fn test_missing_accuracy() {
        assert_eq!(run(None).evidence, vec![INSUFFICIENT_DATA]);
    }
}
