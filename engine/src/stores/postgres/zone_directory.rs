//! Work zones from the `work_zones` table.

use super::db_error;
use crate::error::{EngineError, Result};
use crate::providers::WorkZoneDirectory;
use geoguard_core::model::{Coordinate, WorkZone, ZoneId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Reads active zones from PostgreSQL on every call.
///
/// Wrap it in a [`CachedZoneDirectory`](crate::CachedZoneDirectory) to
/// bound the read rate.
#[derive(Clone)]
pub struct PostgresWorkZoneDirectory {
    pool: PgPool,
}

impl PostgresWorkZoneDirectory {
    /// Create a directory on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_zone(row: &PgRow) -> Result<WorkZone> {
        let decode = |e: sqlx::Error| EngineError::Serialization(format!("work_zones row: {e}"));

        let id: i64 = row.try_get("id").map_err(decode)?;
        let id = u64::try_from(id)
            .map_err(|_| EngineError::Serialization(format!("negative zone id {id}")))?;

        Ok(WorkZone {
            id: ZoneId(id),
            name: row.try_get("name").map_err(decode)?,
            center: Coordinate::new(
                row.try_get("center_latitude").map_err(decode)?,
                row.try_get("center_longitude").map_err(decode)?,
            ),
            radius_meters: row.try_get("radius_meters").map_err(decode)?,
            is_active: row.try_get("is_active").map_err(decode)?,
            strict_geofence: row.try_get("strict_geofence").map_err(decode)?,
            required_accuracy_meters: row.try_get("required_accuracy_meters").map_err(decode)?,
            tolerance_meters: row.try_get("tolerance_meters").map_err(decode)?,
            allowed_shifts: row.try_get("allowed_shifts").map_err(decode)?,
        })
    }
}

impl std::fmt::Debug for PostgresWorkZoneDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresWorkZoneDirectory").finish_non_exhaustive()
    }
}

impl WorkZoneDirectory for PostgresWorkZoneDirectory {
    async fn active_zones(&self) -> Result<Vec<WorkZone>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, center_latitude, center_longitude, radius_meters,
                   is_active, strict_geofence, required_accuracy_meters,
                   tolerance_meters, allowed_shifts
            FROM work_zones
            WHERE is_active
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load work zones", &e))?;

        rows.iter().map(Self::row_to_zone).collect()
    }
}
