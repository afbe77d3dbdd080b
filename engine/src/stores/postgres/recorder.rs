//! Append-only PostgreSQL audit trail.

use super::db_error;
use crate::error::{EngineError, Result};
use crate::providers::DetectionRecorder;
use geoguard_core::record::{DetectionRecord, RecordId};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

/// Writes one `detection_records` row per evaluation.
///
/// Rows are never updated; the table carries a trigger that rejects
/// `UPDATE` and `DELETE`.
#[derive(Clone)]
pub struct PostgresDetectionRecorder {
    pool: PgPool,
}

impl PostgresDetectionRecorder {
    /// Create a recorder on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for PostgresDetectionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDetectionRecorder").finish_non_exhaustive()
    }
}

impl DetectionRecorder for PostgresDetectionRecorder {
    async fn record(&self, record: &DetectionRecord) -> Result<RecordId> {
        let id = Uuid::new_v4();
        let verdict = &record.verdict;
        let geofence = &verdict.geofence_result;
        let zone_id = geofence
            .zone_id
            .map(|zone| i64::try_from(zone.0))
            .transpose()
            .map_err(|_| EngineError::Serialization("zone id exceeds BIGINT".to_string()))?;
        let block_secs = i64::try_from(verdict.block_duration.as_secs()).unwrap_or(i64::MAX);

        sqlx::query(
            r"
            INSERT INTO detection_records (
                id, user_id, attendance_type, shift_id,
                latitude, longitude, accuracy_meters, captured_at,
                zone_id, distance_meters, within_zone,
                total_score, risk_level, action, requires_human_review,
                block_duration_secs, reason, terminal_state,
                sample, findings, verdict, evaluated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            ",
        )
        .bind(id)
        .bind(record.user_id.as_str())
        .bind(record.attendance_type.as_str())
        .bind(record.shift_id.as_deref())
        .bind(record.sample.latitude)
        .bind(record.sample.longitude)
        .bind(record.sample.accuracy_meters)
        .bind(record.sample.captured_at)
        .bind(zone_id)
        .bind(Some(geofence.distance_meters).filter(|d| d.is_finite()))
        .bind(geofence.within_zone)
        .bind(verdict.risk_assessment.total_score)
        .bind(verdict.risk_assessment.risk_level.as_str())
        .bind(verdict.action.as_str())
        .bind(verdict.requires_human_review)
        .bind(block_secs)
        .bind(&verdict.reason)
        .bind(record.terminal_state.label())
        .bind(Json(&record.sample))
        .bind(Json(&record.findings))
        .bind(Json(verdict))
        .bind(record.evaluated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert detection record", &e))?;

        tracing::debug!(
            record_id = %id,
            user_id = %record.user_id,
            action = %verdict.action,
            "Detection record stored"
        );
        Ok(RecordId::new(id.to_string()))
    }
}
