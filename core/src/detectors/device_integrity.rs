//! Device integrity detection.

use super::{from_signals, DetectionContext, DetectionFinding, Detector, DetectorKind};
use crate::model::LocationSample;

/// Confidence for an emulator.
pub const EMULATOR_CONFIDENCE: f64 = 0.9;

/// Confidence for a failed integrity attestation.
pub const INTEGRITY_FAILED_CONFIDENCE: f64 = 0.8;

/// Confidence for a rooted or jailbroken device.
pub const ROOTED_CONFIDENCE: f64 = 0.7;

/// Flags rooted, jailbroken or emulated devices and failed attestations.
///
/// The finding's confidence is the strongest individual signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceIntegrityDetector;

impl Detector for DeviceIntegrityDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::DeviceIntegrity
    }

    fn detect(&self, sample: &LocationSample, _ctx: &DetectionContext<'_>) -> DetectionFinding {
        let kind = self.kind();
        let Some(fp) = sample.device_fingerprint.as_ref() else {
            return DetectionFinding::insufficient_data(kind);
        };

        let mut signals = Vec::new();
        if fp.is_rooted {
            signals.push((ROOTED_CONFIDENCE, "device is rooted".to_string()));
        }
        if fp.is_jailbroken {
            signals.push((ROOTED_CONFIDENCE, "device is jailbroken".to_string()));
        }
        if fp.is_emulator {
            signals.push((EMULATOR_CONFIDENCE, "running on an emulator".to_string()));
        }
        if fp.system_integrity == Some(false) {
            signals.push((
                INTEGRITY_FAILED_CONFIDENCE,
                "system integrity check failed".to_string(),
            ));
        }

        from_signals(kind, signals, "device integrity intact")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::detectors::{HistoryContext, INSUFFICIENT_DATA};
    use crate::model::DeviceFingerprint;
    use chrono::Utc;

    fn run(fp: Option<DeviceFingerprint>) -> DetectionFinding {
        let config = EngineConfig::default();
        let ctx = DetectionContext::new(&config, HistoryContext::FirstObservation);
        let mut sample = LocationSample::new(-6.2, 106.8, Utc::now());
        sample.device_fingerprint = fp;
        DeviceIntegrityDetector.detect(&sample, &ctx)
    }

    #[test]
    fn test_rooted_emulator_takes_max_confidence() {
        let finding = run(Some(DeviceFingerprint {
            is_rooted: true,
            is_emulator: true,
            ..DeviceFingerprint::default()
        }));
        assert!(finding.triggered);
        assert_eq!(finding.confidence, EMULATOR_CONFIDENCE);
        assert_eq!(finding.evidence, vec!["device is rooted", "running on an emulator"]);
    }

    #[test]
    fn test_failed_attestation() {
        let finding = run(Some(DeviceFingerprint {
            system_integrity: Some(false),
            ..DeviceFingerprint::default()
        }));
        assert_eq!(finding.confidence, INTEGRITY_FAILED_CONFIDENCE);
    }

    #[test]
    fn test_passed_or_missing_attestation_is_clean() {
        let passed = run(Some(DeviceFingerprint {
            system_integrity: Some(true),
            ..DeviceFingerprint::default()
        }));
        assert!(!passed.triggered);
        assert!(!run(Some(DeviceFingerprint::default())).triggered);
    }

    #[test]
    fn test_missing_fingerprint() {
        let finding = run(None);
        assert!(!finding.triggered);
        assert_eq!(finding.evidence, vec![INSUFFICIENT_DATA]);
    }
}
