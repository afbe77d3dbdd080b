//! Fake-GPS app detection.

use super::{DetectionContext, DetectionFinding, Detector, DetectorKind};
use crate::model::LocationSample;

/// Confidence for a single denylisted app.
pub const BASE_CONFIDENCE: f64 = 0.6;

/// Added for every further denylisted app.
pub const PER_EXTRA_MATCH: f64 = 0.2;

/// Flags devices with known fake-GPS apps installed.
///
/// Package identifiers are compared case-insensitively against
/// `EngineConfig::fake_gps_denylist`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeGpsAppDetector;

impl Detector for FakeGpsAppDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::FakeGpsApp
    }

    fn detect(&self, sample: &LocationSample, ctx: &DetectionContext<'_>) -> DetectionFinding {
        let kind = self.kind();
        let Some(fingerprint) = sample.device_fingerprint.as_ref() else {
            return DetectionFinding::insufficient_data(kind);
        };

        let denylist = &ctx.config.fake_gps_denylist;
        let mut matches: Vec<&str> = Vec::new();
        for app in &fingerprint.installed_apps {
            let app = app.trim();
            let listed = denylist.iter().any(|d| d.eq_ignore_ascii_case(app));
            if listed && !matches.iter().any(|m| m.eq_ignore_ascii_case(app)) {
                matches.push(app);
            }
        }

        if matches.is_empty() {
            return DetectionFinding::clear(kind, "no known fake GPS apps installed");
        }

        #[allow(clippy::cast_precision_loss)]
        let extra = (matches.len() - 1) as f64;
        let confidence = PER_EXTRA_MATCH.mul_add(extra, BASE_CONFIDENCE).min(1.0);
        let evidence = matches
            .iter()
            .map(|app| format!("fake GPS app installed: {app}"))
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let count = matches.len() as f64;
        DetectionFinding::triggered(kind, confidence, evidence).with_metric("match_count", count)
    }
}
