//! Work zone directory trait.

use crate::error::Result;
use geoguard_core::geofence::closest_zone;
use geoguard_core::model::{Coordinate, WorkZone};
use std::future::Future;

/// Read-only source of work zones.
///
/// Zones are maintained by admin tooling outside the engine. Implementations
/// may cache, but must not serve a zone whose `is_active` flag flipped longer
/// ago than the configured staleness window; see
/// [`CachedZoneDirectory`](crate::zone_cache::CachedZoneDirectory).
pub trait WorkZoneDirectory: Send + Sync {
    /// All zones with `is_active = true`.
    ///
    /// An empty list is a valid answer and means "no zone configured".
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be read.
    fn active_zones(&self) -> impl Future<Output = Result<Vec<WorkZone>>> + Send;

    /// Nearest active zone to `point` and its distance in meters.
    ///
    /// Ties go to the lowest zone id. With no active zone the result is
    /// `(None, f64::INFINITY)`.
    ///
    /// # Errors
    ///
    /// Returns error if [`active_zones`](Self::active_zones) fails.
    fn closest_zone(
        &self,
        point: Coordinate,
    ) -> impl Future<Output = Result<(Option<WorkZone>, f64)>> + Send {
        async move {
            let zones = self.active_zones().await?;
            let (zone, distance) = closest_zone(point, &zones);
            Ok((zone.cloned(), distance))
        }
    }
}
