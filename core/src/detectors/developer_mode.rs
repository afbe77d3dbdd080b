//! Developer settings detection.

use super::{from_signals, DetectionContext, DetectionFinding, Detector, DetectorKind};
use crate::model::LocationSample;

/// Flags devices with developer options, USB debugging or unknown sources
/// switched on. Any one flag fires the detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeveloperModeDetector;

impl Detector for DeveloperModeDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::DeveloperMode
    }

    fn detect(&self, sample: &LocationSample, _ctx: &DetectionContext<'_>) -> DetectionFinding {
        let kind = self.kind();
        let Some(fp) = sample.device_fingerprint.as_ref() else {
            return DetectionFinding::insufficient_data(kind);
        };

        let mut signals = Vec::new();
        if fp.developer_mode_enabled {
            signals.push((0.5, "developer options enabled".to_string()));
        }
        if fp.usb_debugging_enabled {
            signals.push((0.6, "USB debugging enabled".to_string()));
        }
        if fp.unknown_sources_enabled {
            signals.push((0.4, "installs from unknown sources allowed".to_string()));
        }

        from_signals(kind, signals, "developer settings disabled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::detectors::HistoryContext;
    use crate::model::DeviceFingerprint;
    use chrono::Utc;

    fn run(fp: DeviceFingerprint) -> DetectionFinding {
        let config = EngineConfig::default();
        let ctx = DetectionContext::new(&config, HistoryContext::FirstObservation);
        let sample = LocationSample::new(-6.2, 106.8, Utc::now()).with_fingerprint(fp);
        DeveloperModeDetector.detect(&sample, &ctx)
    }

    #[test]
    fn test_each_flag_is_separate_evidence() {
        let finding = run(DeviceFingerprint {
            developer_mode_enabled: true,
            usb_debugging_enabled: true,
            unknown_sources_enabled: true,
            ..DeviceFingerprint::default()
        });
        assert!(finding.triggered);
        assert_eq!(finding.evidence.len(), 3);
        assert_eq!(finding.confidence, 0.6);
    }

    #[test]
    fn test_single_flag() {
        let finding = run(DeviceFingerprint {
            unknown_sources_enabled: true,
            ..DeviceFingerprint::default()
        });
        assert!(finding.triggered);
        assert_eq!(finding.confidence, 0.4);
    }

    #[test]
    fn test_no_flags() {
        assert!(!run(DeviceFingerprint::default()).triggered);
    }
}
