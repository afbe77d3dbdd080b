//! Great-circle geometry.
//!
//! All distances are in meters. Inputs are not validated here: invalid
//! coordinates give a defined but meaningless number, and rejecting them is
//! the job of [`crate::validation`].

use crate::model::{Coordinate, WorkZone};

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters.
///
/// # Examples
///
/// ```
/// use geoguard_core::geo::haversine_distance;
///
/// assert_eq!(haversine_distance(-6.2, 106.8, -6.2, 106.8), 0.0);
///
/// // One degree of latitude is roughly 111.2 km
/// let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
/// assert!((d - 111_195.0).abs() < 1.0);
/// ```
#[must_use]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1.0 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Distance between two coordinates, in meters.
#[must_use]
pub fn distance_between(a: Coordinate, b: Coordinate) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Check whether a point lies inside a zone's radius.
///
/// Returns `(within, distance_meters)`. The boundary is inclusive: a point
/// exactly `radius_meters` away counts as inside.
#[must_use]
pub fn is_within_zone(point: Coordinate, zone: &WorkZone) -> (bool, f64) {
    let distance = distance_between(point, zone.center);
    (distance <= zone.radius_meters, distance)
}

/// Average speed in km/h for a displacement over an elapsed time.
///
/// Returns `None` when no time has elapsed.
///
/// # Examples
///
/// ```
/// use geoguard_core::geo::travel_speed_kmh;
///
/// // 100,000 km in one hour
/// assert_eq!(travel_speed_kmh(100_000_000.0, 3600.0), Some(100_000.0));
/// assert_eq!(travel_speed_kmh(10.0, 0.0), None);
/// ```
#[must_use]
pub fn travel_speed_kmh(distance_meters: f64, elapsed_seconds: f64) -> Option<f64> {
    if elapsed_seconds <= 0.0 {
        return None;
    }
    Some((distance_meters / 1000.0) / (elapsed_seconds / 3600.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn zone(radius: f64) -> WorkZone {
        WorkZone::new(1, "Clinic", Coordinate::new(-6.2088, 106.8456), radius)
    }

    #[test]
    fn test_zero_distance_for_same_point() {
        assert_eq!(haversine_distance(51.5007, -0.1246, 51.5007, -0.1246), 0.0);
    }

    #[test]
    fn test_known_distance_london_paris() {
        // Big Ben to the Eiffel Tower, about 340.5 km
        let d = haversine_distance(51.5007, -0.1246, 48.8584, 2.2945);
        assert!((d - 340_500.0).abs() < 1_000.0, "got {d}");
    }

    #[test]
    fn test_short_distance_accuracy() {
        // 0.001 degrees of latitude is 111.19 m on a 6371 km sphere
        let d = haversine_distance(0.0, 0.0, 0.001, 0.0);
        assert!((d - 111.194_9).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_antipodal_points_do_not_produce_nan() {
        let d = haversine_distance(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn test_zone_boundary_is_inclusive() {
        let z = zone(100.0);
        let edge = Coordinate::new(-6.2088 + 0.0009, 106.8456);
        let (_, distance) = is_within_zone(edge, &z);

        let exact = zone(distance);
        let (within, _) = is_within_zone(edge, &exact);
        assert!(within, "distance == radius must count as inside");

        let smaller = zone(distance - 0.001);
        let (within, _) = is_within_zone(edge, &smaller);
        assert!(!within);
    }

    #[test]
    fn test_center_is_within_zone() {
        let z = zone(50.0);
        let (within, distance) = is_within_zone(z.center, &z);
        assert!(within);
        assert_eq!(distance, 0.0);
    }

    proptest! {
        #[test]
        fn prop_haversine_is_symmetric(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            let ab = haversine_distance(lat1, lon1, lat2, lon2);
            let ba = haversine_distance(lat2, lon2, lat1, lon1);
            prop_assert!((ab - ba).abs() < 1e-6, "ab={} ba={}", ab, ba);
        }

        #[test]
        fn prop_haversine_identity(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            prop_assert_eq!(haversine_distance(lat, lon, lat, lon), 0.0);
        }

        #[test]
        fn prop_containment_matches_radius(
            dlat in -0.05f64..0.05, dlon in -0.05f64..0.05, radius in 1.0f64..5_000.0,
        ) {
            let z = zone(radius);
            let point = Coordinate::new(z.center.latitude + dlat, z.center.longitude + dlon);
            let (within, distance) = is_within_zone(point, &z);
            prop_assert_eq!(within, distance <= radius);
        }
    }
}
