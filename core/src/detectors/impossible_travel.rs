//! Impossible travel detection.
//!
//! Compares the sample with the user's previous stored fix. Two independent
//! signals can fire:
//!
//! - **speed**: the implied ground speed exceeds `travel.max_speed_kmh`,
//!   judged only when more than `travel.debounce_window_secs` elapsed so
//!   GPS jitter on back-to-back reads does not count;
//! - **frequency**: the sample arrived less than
//!   `travel.min_time_between_locations_secs` after the previous one,
//!   whatever the distance.

use super::{DetectionContext, DetectionFinding, Detector, DetectorKind, HistoryContext};
use crate::geo::{distance_between, travel_speed_kmh};
use crate::model::LocationSample;

/// Confidence of the "too frequent" signal.
pub const TOO_FREQUENT_CONFIDENCE: f64 = 0.4;

/// Evidence when there is no previous fix.
pub const FIRST_OBSERVATION: &str = "first observation";

/// Evidence when the previous fix has the same or a later timestamp.
pub const NO_ELAPSED_TIME: &str = "no elapsed time";

/// Flags physically implausible movement between consecutive fixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpossibleTravelDetector;

/// Confidence for a speed over the limit: 0.5 at the limit, rising to 1.0 at
/// twice the limit.
#[must_use]
pub fn speed_confidence(speed_kmh: f64, max_speed_kmh: f64) -> f64 {
    0.5f64.mul_add(speed_kmh / max_speed_kmh - 1.0, 0.5).min(1.0)
}

impl Detector for ImpossibleTravelDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::ImpossibleTravel
    }

    fn detect(&self, sample: &LocationSample, ctx: &DetectionContext<'_>) -> DetectionFinding {
        let kind = self.kind();
        let previous = match ctx.history {
            HistoryContext::Unavailable => return DetectionFinding::insufficient_data(kind),
            HistoryContext::FirstObservation => {
                return DetectionFinding::clear(kind, FIRST_OBSERVATION);
            }
            HistoryContext::Previous(previous) => previous,
        };

        let travel = ctx.config.travel;
        #[allow(clippy::cast_precision_loss)]
        let elapsed_secs =
            (sample.captured_at - previous.captured_at()).num_milliseconds() as f64 / 1000.0;
        let distance_m = distance_between(previous.coordinate(), sample.coordinate());

        let Some(speed_kmh) = travel_speed_kmh(distance_m, elapsed_secs) else {
            return DetectionFinding::clear(kind, NO_ELAPSED_TIME)
                .with_metric("distance_m", distance_m)
                .with_metric("elapsed_s", elapsed_secs);
        };

        let mut signals = Vec::new();

        #[allow(clippy::cast_precision_loss)]
        let debounce = travel.debounce_window_secs as f64;
        if speed_kmh > travel.max_speed_kmh && elapsed_secs > debounce {
            signals.push((
                speed_confidence(speed_kmh, travel.max_speed_kmh),
                format!(
                    "moved {:.0} m in {elapsed_secs:.0} s ({speed_kmh:.0} km/h, limit {:.0} km/h)",
                    distance_m, travel.max_speed_kmh
                ),
            ));
        }

        #[allow(clippy::cast_precision_loss)]
        let min_gap = travel.min_time_between_locations_secs as f64;
        if elapsed_secs < min_gap {
            signals.push((
                TOO_FREQUENT_CONFIDENCE,
                format!(
                    "submitted {elapsed_secs:.0} s after the previous fix (minimum {min_gap:.0} s)"
                ),
            ));
        }

        super::from_signals(kind, signals, "travel speed plausible")
            .with_metric("distance_m", distance_m)
            .with_metric("elapsed_s", elapsed_secs)
            .with_metric("speed_kmh", speed_kmh)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::geo::EARTH_RADIUS_METERS;
    use crate::model::LastKnownFix;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    fn previous_at_origin() -> LastKnownFix {
        LastKnownFix::new(LocationSample::new(0.0, 0.0, t0()), t0())
    }

    fn run(previous: &LastKnownFix, current: &LocationSample) -> DetectionFinding {
        let config = EngineConfig::default();
        let ctx = DetectionContext::new(&config, HistoryContext::Previous(previous));
        ImpossibleTravelDetector.detect(current, &ctx)
    }

    // A point whose great-circle distance from (0, 0) is exactly `meters`
    fn point_along_equator(meters: f64) -> (f64, f64) {
        let degrees = (meters / EARTH_RADIUS_METERS).to_degrees();
        (0.0, degrees)
    }

    #[test]
    fn test_unrealistic_speed_triggers() {
        // 10,000 km in one hour
        let (lat, lon) = point_along_equator(10_000_000.0);
        let current = LocationSample::new(lat, lon, t0() + Duration::seconds(3600));

        let finding = run(&previous_at_origin(), &current);
        assert!(finding.triggered);
        assert_eq!(finding.confidence, 1.0);
        let speed = finding.raw_metrics["speed_kmh"];
        assert!((speed - 10_000.0).abs() < 0.01, "speed {speed}");
    }

    #[test]
    fn test_speed_within_debounce_window_does_not_trigger_on_speed() {
        let (lat, lon) = point_along_equator(10_000_000.0);
        let current = LocationSample::new(lat, lon, t0() + Duration::seconds(1));

        let finding = run(&previous_at_origin(), &current);
        // Only the frequency signal fires
        assert!(finding.triggered);
        assert_eq!(finding.confidence, TOO_FREQUENT_CONFIDENCE);
        assert_eq!(finding.evidence.len(), 1);
        assert!(finding.evidence[0].starts_with("submitted 1 s"));
    }

    #[test]
    fn test_speed_confidence_curve() {
        assert_eq!(speed_confidence(200.0, 200.0), 0.5);
        assert_eq!(speed_confidence(300.0, 200.0), 0.75);
        assert_eq!(speed_confidence(400.0, 200.0), 1.0);
        assert_eq!(speed_confidence(4_000.0, 200.0), 1.0);
    }

    #[test]
    fn test_same_instant_is_not_a_division_by_zero() {
        let current = LocationSample::new(0.5, 0.5, t0());
        let finding = run(&previous_at_origin(), &current);
        assert!(!finding.triggered);
        assert_eq!(finding.evidence, vec![NO_ELAPSED_TIME]);
    }

    #[test]
    fn test_out_of_order_fix_is_not_triggered() {
        let current = LocationSample::new(0.5, 0.5, t0() - Duration::seconds(30));
        let finding = run(&previous_at_origin(), &current);
        assert!(!finding.triggered);
        assert_eq!(finding.evidence, vec![NO_ELAPSED_TIME]);
    }

    #[test]
    fn test_walking_pace_is_clean() {
        // ~111 m in five minutes
        let current = LocationSample::new(0.001, 0.0, t0() + Duration::minutes(5));
        let finding = run(&previous_at_origin(), &current);
        assert!(!finding.triggered);
    }

    #[test]
    fn test_first_observation() {
        let config = EngineConfig::default();
        let ctx = DetectionContext::new(&config, HistoryContext::FirstObservation);
        let finding = ImpossibleTravelDetector.detect(&LocationSample::new(1.0, 1.0, t0()), &ctx);
        assert!(!finding.triggered);
        assert_eq!(finding.evidence, vec![FIRST_OBSERVATION]);
    }
}
