//! PostgreSQL stores.
//!
//! Both stores share one pool and one migration set (`engine/migrations`).

pub mod recorder;
pub mod zone_directory;

pub use recorder::PostgresDetectionRecorder;
pub use zone_directory::PostgresWorkZoneDirectory;

use crate::error::{EngineError, Result};
use sqlx::PgPool;

/// Run the engine migrations against `pool`.
///
/// # Errors
///
/// Returns [`EngineError::Storage`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| EngineError::Storage(format!("Migration failed: {e}")))?;
    Ok(())
}

pub(crate) fn db_error(action: &str, e: &sqlx::Error) -> EngineError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            EngineError::Unavailable(format!("PostgreSQL {action}: {e}"))
        }
        _ => EngineError::Storage(format!("PostgreSQL {action}: {e}")),
    }
}
