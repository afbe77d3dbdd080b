//! Coordinate anomaly detection.

use super::{from_signals, DetectionContext, DetectionFinding, Detector, DetectorKind};
use crate::model::LocationSample;

/// Flags coordinates that no real receiver would produce: null island,
/// out-of-range values, more decimals than GPS resolves, and long runs of a
/// repeated digit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateAnomalyDetector;

/// Digits after the decimal point in the shortest round-trip form of `value`.
fn fraction_digits(value: f64) -> String {
    let text = value.abs().to_string();
    text.split_once('.')
        .map(|(_, fraction)| fraction.to_string())
        .unwrap_or_default()
}

/// Length of the longest run of one repeated digit.
fn longest_digit_run(digits: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut last = None;
    for c in digits.chars() {
        if Some(c) == last {
            current += 1;
        } else {
            current = 1;
            last = Some(c);
        }
        longest = longest.max(current);
    }
    longest
}

impl Detector for CoordinateAnomalyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::CoordinateAnomaly
    }

    fn detect(&self, sample: &LocationSample, ctx: &DetectionContext<'_>) -> DetectionFinding {
        let kind = self.kind();
        let rules = ctx.config.coordinates;
        let point = sample.coordinate();
        let mut signals = Vec::new();

        if !point.is_in_range() {
            signals.push((
                1.0,
                format!(
                    "coordinates ({}, {}) are outside the valid range",
                    sample.latitude, sample.longitude
                ),
            ));
            return from_signals(kind, signals, "");
        }

        if point.is_null_island() {
            signals.push((0.9, "coordinates are (0, 0) null island".to_string()));
        }

        let mut max_decimals = 0;
        let mut max_run = 0;
        for (axis, value) in [("latitude", sample.latitude), ("longitude", sample.longitude)] {
            let digits = fraction_digits(value);
            let decimals = digits.len();
            let run = longest_digit_run(&digits);
            max_decimals = max_decimals.max(decimals);
            max_run = max_run.max(run);

            if decimals > rules.max_decimal_places as usize {
                signals.push((
                    0.6,
                    format!(
                        "{axis} has {decimals} decimal places (GPS resolves at most {})",
                        rules.max_decimal_places
                    ),
                ));
            }
            if run >= rules.repeating_digit_run {
                signals.push((0.5, format!("{axis} {value} repeats one digit {run} times")));
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let (max_decimals, max_run) = (max_decimals as f64, max_run as f64);
        from_signals(kind, signals, "coordinates look plausible")
            .with_metric("max_decimal_places", max_decimals)
            .with_metric("longest_digit_run", max_run)
    }
}
