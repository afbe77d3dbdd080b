//! Pre-validation of incoming samples.
//!
//! Runs after the whitelist check and before anything else looks at the
//! sample. Problems are returned as values so the orchestrator can turn
//! them into an invalid-input verdict instead of aborting the request.

use crate::model::LocationSample;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One reason a sample cannot be analyzed.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Latitude or longitude is NaN or infinite.
    #[error("coordinates are not finite numbers")]
    NonFiniteCoordinate,

    /// Latitude outside -90..=90.
    #[error("latitude {value} is outside -90..90")]
    LatitudeOutOfRange {
        /// Submitted latitude
        value: f64,
    },

    /// Longitude outside -180..=180.
    #[error("longitude {value} is outside -180..180")]
    LongitudeOutOfRange {
        /// Submitted longitude
        value: f64,
    },

    /// Accuracy is NaN or infinite.
    #[error("accuracy is not a finite number")]
    NonFiniteAccuracy,

    /// Accuracy is negative.
    #[error("accuracy {value} is negative")]
    NegativeAccuracy {
        /// Submitted accuracy
        value: f64,
    },
}

/// Collect every problem with a sample.
///
/// An empty vector means the sample may be analyzed.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use geoguard_core::model::LocationSample;
/// use geoguard_core::validation::{validate_sample, ValidationIssue};
///
/// let ok = LocationSample::new(-6.2, 106.8, Utc::now());
/// assert!(validate_sample(&ok).is_empty());
///
/// let bad = LocationSample::new(91.0, 106.8, Utc::now());
/// assert_eq!(
///     validate_sample(&bad),
///     vec![ValidationIssue::LatitudeOutOfRange { value: 91.0 }]
/// );
/// ```
#[must_use]
pub fn validate_sample(sample: &LocationSample) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if !sample.latitude.is_finite() || !sample.longitude.is_finite() {
        issues.push(ValidationIssue::NonFiniteCoordinate);
    } else {
        if !(-90.0..=90.0).contains(&sample.latitude) {
            issues.push(ValidationIssue::LatitudeOutOfRange {
                value: sample.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&sample.longitude) {
            issues.push(ValidationIssue::LongitudeOutOfRange {
                value: sample.longitude,
            });
        }
    }

    if let Some(accuracy) = sample.accuracy_meters {
        if !accuracy.is_finite() {
            issues.push(ValidationIssue::NonFiniteAccuracy);
        } else if accuracy < 0.0 {
            issues.push(ValidationIssue::NegativeAccuracy { value: accuracy });
        }
    }

    issues
}

/// Render issues as a single human-readable sentence.
#[must_use]
pub fn describe_issues(issues: &[ValidationIssue]) -> String {
    let parts: Vec<String> = issues.iter().map(ToString::to_string).collect();
    format!("Invalid location data: {}", parts.join(", "))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(lat: f64, lon: f64) -> LocationSample {
        LocationSample::new(lat, lon, Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap())
    }

    #[test]
    fn test_boundaries_are_valid() {
        assert!(validate_sample(&sample(90.0, 180.0)).is_empty());
        assert!(validate_sample(&sample(-90.0, -180.0)).is_empty());
        assert!(validate_sample(&sample(0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_nan_coordinates() {
        assert_eq!(
            validate_sample(&sample(f64::NAN, 10.0)),
            vec![ValidationIssue::NonFiniteCoordinate]
        );
    }

    #[test]
    fn test_collects_every_issue() {
        let s = sample(-95.0, 200.0).with_accuracy(-3.0);
        let issues = validate_sample(&s);
        assert_eq!(issues.len(), 3);
        assert!(issues.contains(&ValidationIssue::NegativeAccuracy { value: -3.0 }));
    }

    #[test]
    fn test_zero_accuracy_is_valid() {
        assert!(validate_sample(&sample(1.0, 1.0).with_accuracy(0.0)).is_empty());
    }

    #[test]
    fn test_describe_issues() {
        let text = describe_issues(&[ValidationIssue::LatitudeOutOfRange { value: 91.0 }]);
        assert_eq!(text, "Invalid location data: latitude 91 is outside -90..90");
    }
}
