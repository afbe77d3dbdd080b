//! Closest-zone resolution.
//!
//! Zones are scanned linearly; the nearest center wins and ties go to the
//! lowest zone id. "No zones" is a normal result, reported as a
//! [`GeofenceResult`] with no zone and an infinite distance so the policy
//! layer treats the sample as outside.

use crate::geo::{distance_between, is_within_zone};
use crate::model::{Coordinate, WorkZone, ZoneId};
use serde::{Deserialize, Serialize};

/// Outcome of matching a sample against the work zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceResult {
    /// Closest eligible zone, if any.
    pub zone_id: Option<ZoneId>,
    /// Name of that zone.
    pub zone_name: Option<String>,
    /// Distance to the zone center; infinite when there is no zone.
    ///
    /// JSON has no infinity, so it round-trips as `null`.
    #[serde(deserialize_with = "distance_or_infinity")]
    pub distance_meters: f64,
    /// Whether the sample counts as inside the zone.
    pub within_zone: bool,
    /// Extra explanation (tolerance used, accuracy requirement not met, ...).
    pub note: Option<String>,
}

impl GeofenceResult {
    /// Result when no zone could be considered.
    #[must_use]
    pub fn no_zone(note: impl Into<String>) -> Self {
        Self {
            zone_id: None,
            zone_name: None,
            distance_meters: f64::INFINITY,
            within_zone: false,
            note: Some(note.into()),
        }
    }

    /// Placeholder for evaluations that stopped before zone resolution.
    #[must_use]
    pub fn not_evaluated() -> Self {
        Self::no_zone("zone check not performed")
    }

    /// Why the sample is outside, or `None` when it is inside.
    #[must_use]
    pub fn outside_reason(&self) -> Option<String> {
        if self.within_zone {
            return None;
        }
        let reason = match (&self.zone_name, &self.note) {
            (Some(name), Some(note)) => {
                format!("{:.0} m from {name} ({note})", self.distance_meters)
            }
            (Some(name), None) => format!("{:.0} m from {name}", self.distance_meters),
            (None, Some(note)) => note.clone(),
            (None, None) => "no work zone configured".to_string(),
        };
        Some(reason)
    }
}

fn distance_or_infinity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or(f64::INFINITY))
}

/// Nearest active zone to `point`.
///
/// Returns `(None, f64::INFINITY)` when no active zone exists.
///
/// # Examples
///
/// ```
/// use geoguard_core::geofence::closest_zone;
/// use geoguard_core::model::{Coordinate, WorkZone};
///
/// let zones = vec![
///     WorkZone::new(2, "East", Coordinate::new(0.0, 0.01), 100.0),
///     WorkZone::new(1, "West", Coordinate::new(0.0, -0.01), 100.0),
/// ];
///
/// // Equidistant: lowest id wins
/// let (zone, _) = closest_zone(Coordinate::new(0.0, 0.0), zones.iter());
/// assert_eq!(zone.map(|z| z.name.as_str()), Some("West"));
///
/// let (none, distance) = closest_zone(Coordinate::new(0.0, 0.0), std::iter::empty());
/// assert!(none.is_none() && distance.is_infinite());
/// ```
#[allow(clippy::float_cmp)]
pub fn closest_zone<'a, I>(point: Coordinate, zones: I) -> (Option<&'a WorkZone>, f64)
where
    I: IntoIterator<Item = &'a WorkZone>,
{
    let mut best: Option<&WorkZone> = None;
    let mut best_distance = f64::INFINITY;

    for zone in zones.into_iter().filter(|z| z.is_active) {
        let distance = distance_between(point, zone.center);
        let closer = match best {
            None => true,
            Some(current) => {
                distance < best_distance || (distance == best_distance && zone.id < current.id)
            }
        };
        if closer {
            best = Some(zone);
            best_distance = distance;
        }
    }

    (best, best_distance)
}

/// Resolve a sample against the zone list.
///
/// Only active zones that admit `shift_id` are eligible. Non-strict zones
/// accept `tolerance_meters` beyond their radius. Strict zones ignore the
/// tolerance and, when they declare `required_accuracy_meters`, reject a
/// sample whose accuracy is missing or worse.
#[must_use]
pub fn resolve_geofence(
    point: Coordinate,
    accuracy_meters: Option<f64>,
    zones: &[WorkZone],
    shift_id: Option<&str>,
) -> GeofenceResult {
    if !zones.iter().any(|z| z.is_active) {
        return GeofenceResult::no_zone("no work zone configured");
    }

    let eligible = zones.iter().filter(|z| z.permits_shift(shift_id));
    let (Some(zone), distance) = closest_zone(point, eligible) else {
        return GeofenceResult::no_zone("no work zone available for this shift");
    };

    let (inside_radius, _) = is_within_zone(point, zone);
    let mut note = None;

    let within_zone = if zone.strict_geofence {
        match zone.required_accuracy_meters {
            Some(required) if !accuracy_meters.is_some_and(|a| a <= required) => {
                note = Some(match accuracy_meters {
                    Some(a) => format!("accuracy {a:.0} m does not meet required {required:.0} m"),
                    None => format!("accuracy unknown, zone requires {required:.0} m"),
                });
                false
            }
            _ => inside_radius,
        }
    } else if inside_radius {
        true
    } else if distance <= zone.radius_meters + zone.tolerance_meters {
        note = Some(format!("within {:.0} m tolerance", zone.tolerance_meters));
        true
    } else {
        false
    };

    GeofenceResult {
        zone_id: Some(zone.id),
        zone_name: Some(zone.name.clone()),
        distance_meters: distance,
        within_zone,
        note,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    const CENTER: Coordinate = Coordinate::new(-6.2088, 106.8456);

    // ~111 m north of CENTER
    fn north_111m() -> Coordinate {
        Coordinate::new(CENTER.latitude + 0.001, CENTER.longitude)
    }

    #[test]
    fn test_no_zones_is_not_an_error() {
        let result = resolve_geofence(CENTER, Some(10.0), &[], None);
        assert_eq!(result.zone_id, None);
        assert!(result.distance_meters.is_infinite());
        assert!(!result.within_zone);
        assert_eq!(result.outside_reason().as_deref(), Some("no work zone configured"));
    }

    #[test]
    fn test_inactive_zones_ignored() {
        let zones = vec![WorkZone::new(1, "Old", CENTER, 100.0).deactivated()];
        let result = resolve_geofence(CENTER, None, &zones, None);
        assert_eq!(result.zone_id, None);
    }

    #[test]
    fn test_closest_zone_wins() {
        let zones = vec![
            WorkZone::new(1, "Far", Coordinate::new(-6.3, 106.8456), 100.0),
            WorkZone::new(2, "Near", CENTER, 100.0),
        ];
        let result = resolve_geofence(CENTER, Some(10.0), &zones, None);
        assert_eq!(result.zone_id, Some(ZoneId(2)));
        assert!(result.within_zone);
        assert_eq!(result.outside_reason(), None);
    }

    #[test]
    fn test_tolerance_extends_non_strict_zone() {
        let zones = vec![WorkZone::new(1, "Site", CENTER, 100.0).with_tolerance(20.0)];
        let result = resolve_geofence(north_111m(), Some(10.0), &zones, None);
        assert!(result.within_zone);
        assert_eq!(result.note.as_deref(), Some("within 20 m tolerance"));
    }

    #[test]
    fn test_strict_zone_ignores_tolerance() {
        let zones = vec![
            WorkZone::new(1, "Lab", CENTER, 100.0)
                .with_tolerance(20.0)
                .strict(None),
        ];
        let result = resolve_geofence(north_111m(), Some(10.0), &zones, None);
        assert!(!result.within_zone);
    }

    #[test]
    fn test_strict_zone_accuracy_requirement() {
        let zones = vec![WorkZone::new(1, "Lab", CENTER, 100.0).strict(Some(20.0))];

        let good = resolve_geofence(CENTER, Some(15.0), &zones, None);
        assert!(good.within_zone);

        let poor = resolve_geofence(CENTER, Some(35.0), &zones, None);
        assert!(!poor.within_zone);
        assert!(poor.note.unwrap().contains("does not meet"));

        let unknown = resolve_geofence(CENTER, None, &zones, None);
        assert!(!unknown.within_zone);
    }

    #[test]
    fn test_shift_restricted_zone() {
        let zones = vec![WorkZone::new(1, "Ward", CENTER, 100.0).with_allowed_shifts(["night"])];

        let night = resolve_geofence(CENTER, Some(10.0), &zones, Some("night"));
        assert!(night.within_zone);

        let morning = resolve_geofence(CENTER, Some(10.0), &zones, Some("morning"));
        assert_eq!(morning.zone_id, None);
        assert_eq!(
            morning.outside_reason().as_deref(),
            Some("no work zone available for this shift")
        );
    }

    #[test]
    fn test_missing_zone_round_trips_through_json() {
        let json = serde_json::to_string(&GeofenceResult::no_zone("none")).unwrap();
        let back: GeofenceResult = serde_json::from_str(&json).unwrap();
        assert!(back.distance_meters.is_infinite());
    }

    #[test]
    fn test_outside_reason_mentions_zone() {
        let zones = vec![WorkZone::new(1, "Clinic", CENTER, 50.0)];
        let result = resolve_geofence(north_111m(), Some(10.0), &zones, None);
        assert_eq!(result.outside_reason().as_deref(), Some("111 m from Clinic"));
    }
}
