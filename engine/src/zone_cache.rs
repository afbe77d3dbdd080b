//! Short-TTL cache in front of a [`WorkZoneDirectory`].
//!
//! Zone definitions change rarely but are read on every evaluation. The
//! cache serves the last answer for at most the configured staleness window,
//! so a zone deactivated by an admin stops counting within that window.
//! [`CachedZoneDirectory::refresh`] bypasses the cache for callers that need
//! the current state.

use crate::error::Result;
use crate::providers::WorkZoneDirectory;
use geoguard_core::config::EngineConfig;
use geoguard_core::model::WorkZone;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug)]
struct CachedZones {
    zones: Vec<WorkZone>,
    loaded_at: Instant,
}

impl CachedZones {
    fn is_fresh(&self, staleness: Duration) -> bool {
        self.loaded_at.elapsed() < staleness
    }
}

/// Zone directory that remembers the last answer for a bounded time.
///
/// Errors are never cached, and a stale entry is never served in place of
/// an error.
#[derive(Debug, Clone)]
pub struct CachedZoneDirectory<Z> {
    inner: Z,
    staleness: Duration,
    cache: Arc<RwLock<Option<CachedZones>>>,
}

impl<Z: WorkZoneDirectory> CachedZoneDirectory<Z> {
    /// Wrap `inner`. A zero `staleness` disables caching.
    #[must_use]
    pub fn new(inner: Z, staleness: Duration) -> Self {
        Self {
            inner,
            staleness,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Wrap `inner` with the staleness window from `config`.
    #[must_use]
    pub fn from_config(inner: Z, config: &EngineConfig) -> Self {
        Self::new(inner, config.zone_cache_staleness())
    }

    /// The configured staleness window.
    #[must_use]
    pub const fn staleness(&self) -> Duration {
        self.staleness
    }

    /// Check if the next read will go to the inner directory.
    pub async fn needs_refresh(&self) -> bool {
        self.cache
            .read()
            .await
            .as_ref()
            .is_none_or(|cached| !cached.is_fresh(self.staleness))
    }

    /// Age of the cached answer, if any.
    pub async fn cache_age(&self) -> Option<Duration> {
        self.cache.read().await.as_ref().map(|c| c.loaded_at.elapsed())
    }

    /// Read through to the inner directory and replace the cached answer.
    ///
    /// # Errors
    ///
    /// Returns the inner directory's error. The previous cached answer is
    /// dropped so it cannot outlive a failed refresh.
    pub async fn refresh(&self) -> Result<Vec<WorkZone>> {
        match self.inner.active_zones().await {
            Ok(zones) => {
                tracing::debug!(zones = zones.len(), "Work zone cache refreshed");
                *self.cache.write().await = Some(CachedZones {
                    zones: zones.clone(),
                    loaded_at: Instant::now(),
                });
                Ok(zones)
            }
            Err(e) => {
                self.invalidate().await;
                Err(e)
            }
        }
    }

    /// Forget the cached answer.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

impl<Z: WorkZoneDirectory> WorkZoneDirectory for CachedZoneDirectory<Z> {
    async fn active_zones(&self) -> Result<Vec<WorkZone>> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh(self.staleness) {
                return Ok(cached.zones.clone());
            }
        }
        self.refresh().await
    }
}
