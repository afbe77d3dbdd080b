//! Whitelist checker trait and the configuration-backed implementation.

use crate::error::Result;
use geoguard_core::config::WhitelistConfig;
use geoguard_core::model::{LocationSample, UserId};
use geoguard_core::whitelist::{WhitelistMatch, match_whitelist};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

/// Operator override: trusted users, devices, addresses and places.
///
/// Checked before anything else. A match skips detection entirely.
pub trait WhitelistChecker: Send + Sync {
    /// The trusted entry matching this request, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the whitelist source is unreachable. The engine then
    /// treats the request as not whitelisted.
    fn is_whitelisted(
        &self,
        user_id: &UserId,
        device_id: Option<&str>,
        ip: Option<IpAddr>,
        sample: &LocationSample,
    ) -> impl Future<Output = Result<Option<WhitelistMatch>>> + Send;
}

/// Whitelist read from the engine configuration.
///
/// Cheap to clone; the entries are shared.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredWhitelist {
    entries: Arc<WhitelistConfig>,
}

impl ConfiguredWhitelist {
    /// Wrap a whitelist section.
    #[must_use]
    pub fn new(entries: WhitelistConfig) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Number of configured entries across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.user_ids.len()
            + self.entries.device_ids.len()
            + self.entries.ip_addresses.len()
            + self.entries.trusted_locations.len()
    }

    /// `true` when nothing is whitelisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl WhitelistChecker for ConfiguredWhitelist {
    async fn is_whitelisted(
        &self,
        user_id: &UserId,
        device_id: Option<&str>,
        ip: Option<IpAddr>,
        sample: &LocationSample,
    ) -> Result<Option<WhitelistMatch>> {
        Ok(match_whitelist(&self.entries, user_id, device_id, ip, sample))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geoguard_core::config::TrustedLocation;
    use geoguard_core::model::Coordinate;

    #[tokio::test]
    async fn test_device_and_location_matches() {
        let whitelist = ConfiguredWhitelist::new(WhitelistConfig {
            device_ids: vec!["kiosk-1".into()],
            trusted_locations: vec![TrustedLocation {
                name: "Head office".into(),
                center: Coordinate::new(-6.2, 106.8),
                radius_meters: 50.0,
            }],
            ..WhitelistConfig::default()
        });
        assert_eq!(whitelist.len(), 2);

        let at = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let user = UserId::new("u-1");

        let kiosk = LocationSample::new(10.0, 10.0, at);
        let matched = whitelist
            .is_whitelisted(&user, Some("kiosk-1"), None, &kiosk)
            .await
            .unwrap();
        assert_eq!(matched, Some(WhitelistMatch::Device("kiosk-1".into())));

        let office = LocationSample::new(-6.2, 106.8, at);
        let matched = whitelist.is_whitelisted(&user, None, None, &office).await.unwrap();
        assert_eq!(matched, Some(WhitelistMatch::Location("Head office".into())));

        let elsewhere = LocationSample::new(10.0, 10.0, at);
        let matched = whitelist.is_whitelisted(&user, None, None, &elsewhere).await.unwrap();
        assert!(matched.is_none());
    }
}
