//! # GeoGuard Testing
//!
//! Testing utilities shared by the GeoGuard crates.
//!
//! This crate provides:
//! - [`FixedClock`] for deterministic evaluation timestamps
//! - Fixtures for work zones, samples and device fingerprints
//! - proptest strategies for coordinates and samples
//! - [`init_tracing`] for readable test output
//!
//! ## Example
//!
//! ```
//! use geoguard_testing::{fixtures, test_clock};
//! use geoguard_core::environment::Clock;
//!
//! let clock = test_clock();
//! let zone = fixtures::clinic_zone();
//! let sample = fixtures::sample_at(zone.center, clock.now()).with_accuracy(10.0);
//! assert_eq!(sample.coordinate(), zone.center);
//! ```

use chrono::{DateTime, Utc};
use geoguard_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use geoguard_testing::mocks::FixedClock;
    /// use geoguard_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Ready-made domain values.
///
/// The clinic zone sits in central Jakarta; `far_away` is roughly 660 km
/// from it, in Surabaya.
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use geoguard_core::model::{
        Coordinate, DeviceFingerprint, LocationSample, NetworkInfo, WorkZone,
    };

    /// Centre of [`clinic_zone`].
    pub const CLINIC_CENTER: Coordinate = Coordinate::new(-6.2088, 106.8456);

    /// A point roughly 660 km east of the clinic.
    #[must_use]
    pub const fn far_away() -> Coordinate {
        Coordinate::new(-7.2575, 112.7521)
    }

    /// Active 100 m zone, id 1.
    #[must_use]
    pub fn clinic_zone() -> WorkZone {
        WorkZone::new(1, "Clinic", CLINIC_CENTER, 100.0)
    }

    /// Active 250 m zone, id 2, about 5 km north of the clinic.
    #[must_use]
    pub fn annex_zone() -> WorkZone {
        WorkZone::new(2, "Annex", Coordinate::new(-6.1638, 106.8456), 250.0)
    }

    /// A bare sample at `point`.
    #[must_use]
    pub const fn sample_at(point: Coordinate, captured_at: DateTime<Utc>) -> LocationSample {
        LocationSample::new(point.latitude, point.longitude, captured_at)
    }

    /// A sample at the clinic centre with plausible accuracy and a clean
    /// device.
    #[must_use]
    pub fn clean_sample(captured_at: DateTime<Utc>) -> LocationSample {
        sample_at(CLINIC_CENTER, captured_at)
            .with_accuracy(10.0)
            .with_provider("gps")
            .with_fingerprint(clean_fingerprint())
    }

    /// Fingerprint with nothing suspicious.
    #[must_use]
    pub fn clean_fingerprint() -> DeviceFingerprint {
        DeviceFingerprint {
            device_id: Some("device-clean".to_string()),
            system_integrity: Some(true),
            installed_apps: vec!["com.whatsapp".to_string()],
            ..DeviceFingerprint::default()
        }
    }

    /// Rooted emulator.
    #[must_use]
    pub fn rooted_emulator() -> DeviceFingerprint {
        DeviceFingerprint {
            device_id: Some("device-rooted".to_string()),
            is_rooted: true,
            is_emulator: true,
            ..DeviceFingerprint::default()
        }
    }

    /// Every flag a fingerprint can raise.
    #[must_use]
    pub fn hostile_fingerprint() -> DeviceFingerprint {
        DeviceFingerprint {
            device_id: Some("device-hostile".to_string()),
            is_rooted: true,
            is_jailbroken: true,
            is_emulator: true,
            developer_mode_enabled: true,
            usb_debugging_enabled: true,
            unknown_sources_enabled: true,
            mock_location_enabled: true,
            system_integrity: Some(false),
            installed_apps: vec![
                "com.lexa.fakegps".to_string(),
                "com.incorporateapps.fakegps.fre".to_string(),
            ],
            ..DeviceFingerprint::default()
        }
    }

    /// Network info flagged as VPN.
    #[must_use]
    pub fn vpn_network(ip: &str) -> NetworkInfo {
        NetworkInfo {
            ip_address: ip.parse().ok(),
            is_vpn: true,
            ..NetworkInfo::default()
        }
    }
}

/// Property-based testing strategies.
pub mod strategies {
    use chrono::{DateTime, Duration, Utc};
    use geoguard_core::model::{Coordinate, LocationSample};
    use proptest::prelude::*;

    /// Any in-range coordinate.
    pub fn coordinate() -> impl Strategy<Value = Coordinate> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| Coordinate::new(lat, lon))
    }

    /// Coordinates within about 0.5 degrees of `center`.
    pub fn coordinate_near(center: Coordinate) -> impl Strategy<Value = Coordinate> {
        (-0.5f64..0.5, -0.5f64..0.5).prop_map(move |(dlat, dlon)| {
            Coordinate::new(
                (center.latitude + dlat).clamp(-90.0, 90.0),
                (center.longitude + dlon).clamp(-180.0, 180.0),
            )
        })
    }

    /// A valid sample captured within a day after `base`.
    pub fn sample(base: DateTime<Utc>) -> impl Strategy<Value = LocationSample> {
        (
            coordinate(),
            proptest::option::of(1.0f64..500.0),
            0i64..86_400,
        )
            .prop_map(move |(point, accuracy, offset)| {
                let sample = LocationSample::new(
                    point.latitude,
                    point.longitude,
                    base + Duration::seconds(offset),
                );
                match accuracy {
                    Some(meters) => sample.with_accuracy(meters),
                    None => sample,
                }
            })
    }
}

/// Install a `tracing` subscriber for tests.
///
/// Honours `RUST_LOG`; calling it more than once is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use geoguard_core::geo::distance_between;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_fixture_geometry() {
        let clinic = fixtures::clinic_zone();
        let annex = fixtures::annex_zone();
        let apart = distance_between(clinic.center, annex.center);
        assert!(apart > 4_000.0 && apart < 6_000.0);

        let far = distance_between(clinic.center, fixtures::far_away());
        assert!(far > 600_000.0);
    }
}
