//! Engine configuration.
//!
//! Every threshold the detectors, the aggregator and the policy table use is
//! read from an [`EngineConfig`] snapshot. The snapshot is built once (from
//! defaults, a JSON document or the environment), validated with
//! [`EngineConfig::validate`] and then shared read-only by all evaluations.
//!
//! All sections deserialize with `#[serde(default)]`, so a partial JSON
//! document only overrides the fields it names.

use crate::detectors::DetectorKind;
use crate::model::{Coordinate, UserId};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors, reported when a snapshot is validated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A detector weight is negative or not finite.
    #[error("Invalid weight for {detector}: {value}")]
    InvalidWeight {
        /// Detector name
        detector: &'static str,
        /// Offending value
        value: f64,
    },

    /// Every detector weight is zero, so no finding could ever score.
    #[error("No detector has a positive weight")]
    NoWeights,

    /// Risk thresholds are not finite and strictly increasing.
    #[error(
        "Risk thresholds must be finite and strictly increasing (medium={medium}, high={high}, critical={critical})"
    )]
    ThresholdsNotOrdered {
        /// Medium threshold
        medium: f64,
        /// High threshold
        high: f64,
        /// Critical threshold
        critical: f64,
    },

    /// A scalar setting is out of range.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the setting
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// A configuration source could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Per-detector weights used by the risk aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionWeights {
    /// Mock location provider.
    pub mock_location: f64,
    /// Known fake-GPS apps installed.
    pub fake_gps_app: f64,
    /// Developer options, USB debugging, unknown sources.
    pub developer_mode: f64,
    /// Implausible speed between consecutive fixes.
    pub impossible_travel: f64,
    /// Synthetic-looking or impossible coordinates.
    pub coordinate_anomaly: f64,
    /// Rooted, jailbroken or emulated device.
    pub device_integrity: f64,
    /// Accuracy outside the plausible band.
    pub gps_accuracy: f64,
    /// VPN, proxy, Tor or denylisted IP.
    pub network_reputation: f64,
}

impl DetectionWeights {
    /// Weight configured for a detector.
    #[must_use]
    pub const fn weight_for(&self, kind: DetectorKind) -> f64 {
        match kind {
            DetectorKind::MockLocation => self.mock_location,
            DetectorKind::FakeGpsApp => self.fake_gps_app,
            DetectorKind::DeveloperMode => self.developer_mode,
            DetectorKind::ImpossibleTravel => self.impossible_travel,
            DetectorKind::CoordinateAnomaly => self.coordinate_anomaly,
            DetectorKind::DeviceIntegrity => self.device_integrity,
            DetectorKind::GpsAccuracy => self.gps_accuracy,
            DetectorKind::NetworkReputation => self.network_reputation,
        }
    }

    /// Override the weight of one detector.
    #[must_use]
    pub const fn with_weight(mut self, kind: DetectorKind, weight: f64) -> Self {
        match kind {
            DetectorKind::MockLocation => self.mock_location = weight,
            DetectorKind::FakeGpsApp => self.fake_gps_app = weight,
            DetectorKind::DeveloperMode => self.developer_mode = weight,
            DetectorKind::ImpossibleTravel => self.impossible_travel = weight,
            DetectorKind::CoordinateAnomaly => self.coordinate_anomaly = weight,
            DetectorKind::DeviceIntegrity => self.device_integrity = weight,
            DetectorKind::GpsAccuracy => self.gps_accuracy = weight,
            DetectorKind::NetworkReputation => self.network_reputation = weight,
        }
        self
    }
}

impl Default for DetectionWeights {
    fn default() -> Self {
        Self {
            mock_location: 40.0,
            fake_gps_app: 45.0,
            developer_mode: 15.0,
            impossible_travel: 50.0,
            coordinate_anomaly: 30.0,
            device_integrity: 35.0,
            gps_accuracy: 15.0,
            network_reputation: 20.0,
        }
    }
}

/// Score boundaries between risk levels. A score equal to a boundary
/// belongs to the higher level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Lowest score classified as medium.
    pub medium: f64,
    /// Lowest score classified as high.
    pub high: f64,
    /// Lowest score classified as critical.
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 40.0,
            high: 70.0,
            critical: 90.0,
        }
    }
}

/// Mock location detector settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockLocationConfig {
    /// Accuracy below this is "too perfect" for a real receiver.
    pub min_accuracy_meters: f64,
}

impl Default for MockLocationConfig {
    fn default() -> Self {
        Self {
            min_accuracy_meters: 5.0,
        }
    }
}

/// Plausible accuracy band for real GPS fixes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsAccuracyConfig {
    /// Lower bound of the band.
    pub min_accuracy_meters: f64,
    /// Upper bound of the band.
    pub max_accuracy_meters: f64,
}

impl Default for GpsAccuracyConfig {
    fn default() -> Self {
        Self {
            min_accuracy_meters: 5.0,
            max_accuracy_meters: 100.0,
        }
    }
}

/// Impossible travel settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelConfig {
    /// Fastest plausible ground speed.
    pub max_speed_kmh: f64,
    /// Speed is only judged when more than this many seconds elapsed.
    pub debounce_window_secs: u64,
    /// Submissions closer together than this are "too frequent".
    pub min_time_between_locations_secs: u64,
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            max_speed_kmh: 200.0,
            debounce_window_secs: 60,
            min_time_between_locations_secs: 10,
        }
    }
}

/// Coordinate anomaly heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateConfig {
    /// Most decimal places a receiver realistically reports.
    pub max_decimal_places: u32,
    /// Repeated-digit run length treated as synthetic.
    pub repeating_digit_run: usize,
}

impl Default for CoordinateConfig {
    fn default() -> Self {
        Self {
            max_decimal_places: 8,
            repeating_digit_run: 5,
        }
    }
}

/// Static network denylist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkConfig {
    /// Client IPs that always trigger the network detector.
    pub ip_denylist: Vec<IpAddr>,
}

/// Enforcement settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Block length for a critical verdict.
    pub critical_block_hours: u64,
    /// When false, critical risk is flagged for review instead of blocked.
    pub auto_block_on_critical: bool,
}

/// Longest accepted critical block (one leap year).
pub const MAX_CRITICAL_BLOCK_HOURS: u64 = 366 * 24;

impl PolicyConfig {
    /// Block length as a duration.
    #[must_use]
    pub const fn critical_block_duration(&self) -> Duration {
        Duration::from_secs(self.critical_block_hours.saturating_mul(3600))
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            critical_block_hours: 24,
            auto_block_on_critical: true,
        }
    }
}

/// A trusted circle, such as an office kiosk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustedLocation {
    /// Label shown in the audit trail.
    pub name: String,
    /// Center of the trusted area.
    pub center: Coordinate,
    /// Radius in meters, inclusive.
    pub radius_meters: f64,
}

/// Operator-configured trusted entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Trusted users.
    pub user_ids: Vec<UserId>,
    /// Trusted devices.
    pub device_ids: Vec<String>,
    /// Trusted client IPs.
    pub ip_addresses: Vec<IpAddr>,
    /// Trusted places.
    pub trusted_locations: Vec<TrustedLocation>,
}

impl WhitelistConfig {
    /// `true` when nothing is whitelisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
            && self.device_ids.is_empty()
            && self.ip_addresses.is_empty()
            && self.trusted_locations.is_empty()
    }
}

/// Per-dependency I/O timeouts, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Work zone directory lookups.
    pub zone_directory_ms: u64,
    /// History store reads and writes.
    pub history_ms: u64,
    /// Detection record writes.
    pub recorder_ms: u64,
    /// Alert dispatch.
    pub alert_ms: u64,
    /// IP reputation lookups.
    pub reputation_ms: u64,
    /// Whitelist checks.
    pub whitelist_ms: u64,
}

impl TimeoutConfig {
    /// Zone directory timeout.
    #[must_use]
    pub const fn zone_directory(&self) -> Duration {
        Duration::from_millis(self.zone_directory_ms)
    }

    /// History store timeout.
    #[must_use]
    pub const fn history(&self) -> Duration {
        Duration::from_millis(self.history_ms)
    }

    /// Recorder timeout.
    #[must_use]
    pub const fn recorder(&self) -> Duration {
        Duration::from_millis(self.recorder_ms)
    }

    /// Alert dispatcher timeout.
    #[must_use]
    pub const fn alert(&self) -> Duration {
        Duration::from_millis(self.alert_ms)
    }

    /// IP reputation timeout.
    #[must_use]
    pub const fn reputation(&self) -> Duration {
        Duration::from_millis(self.reputation_ms)
    }

    /// Whitelist timeout.
    #[must_use]
    pub const fn whitelist(&self) -> Duration {
        Duration::from_millis(self.whitelist_ms)
    }

    fn entries(&self) -> [(&'static str, u64); 6] {
        [
            ("timeouts.zone_directory_ms", self.zone_directory_ms),
            ("timeouts.history_ms", self.history_ms),
            ("timeouts.recorder_ms", self.recorder_ms),
            ("timeouts.alert_ms", self.alert_ms),
            ("timeouts.reputation_ms", self.reputation_ms),
            ("timeouts.whitelist_ms", self.whitelist_ms),
        ]
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            zone_directory_ms: 3_000,
            history_ms: 2_000,
            recorder_ms: 5_000,
            alert_ms: 5_000,
            reputation_ms: 2_000,
            whitelist_ms: 1_000,
        }
    }
}

/// Per-user lock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockingConfig {
    /// How long one acquisition attempt waits.
    pub acquire_timeout_ms: u64,
    /// Extra attempts after the first one times out.
    pub retries: u32,
}

impl LockingConfig {
    /// Acquisition timeout as a duration.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 2_000,
            retries: 1,
        }
    }
}

/// Package identifiers of widely distributed fake-GPS apps.
pub const DEFAULT_FAKE_GPS_PACKAGES: &[&str] = &[
    "com.lexa.fakegps",
    "com.incorporateapps.fakegps.fre",
    "com.blogspot.newapphorizons.fakegps",
    "com.theappninjas.gpsjoystick",
    "com.theappninjas.fakegpsjoystick",
    "ru.gavrikov.mocklocations",
    "com.gsmartstudio.fakegps",
    "com.rosteam.gpsemulator",
    "com.evezzon.fakegps",
    "fr.dvilleneuve.lockito",
    "com.just4funtools.fakegpslocationprofessional",
    "com.usefullapps.fakegpslocationpro",
    "com.divi.fakegps",
    "com.fakegps.mock",
];

/// Complete configuration snapshot for the engine.
///
/// # Examples
///
/// ```
/// use geoguard_core::config::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_outside_zone_penalty(25.0)
///     .with_zone_cache_staleness_secs(30);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.thresholds.critical, 90.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Detector weights.
    pub weights: DetectionWeights,
    /// Risk level boundaries.
    pub thresholds: RiskThresholds,
    /// Score added when the sample is outside every work zone.
    pub outside_zone_penalty: f64,
    /// Mock location detector.
    pub mock_location: MockLocationConfig,
    /// GPS accuracy detector.
    pub gps_accuracy: GpsAccuracyConfig,
    /// Impossible travel detector.
    pub travel: TravelConfig,
    /// Coordinate anomaly detector.
    pub coordinates: CoordinateConfig,
    /// Fake-GPS app package identifiers, matched case-insensitively.
    pub fake_gps_denylist: Vec<String>,
    /// Network reputation detector.
    pub network: NetworkConfig,
    /// Enforcement.
    pub policy: PolicyConfig,
    /// Trusted entries that bypass detection.
    pub whitelist: WhitelistConfig,
    /// Dependency timeouts.
    pub timeouts: TimeoutConfig,
    /// Longest time a cached zone list may be served.
    pub zone_cache_staleness_secs: u64,
    /// Per-user lock.
    pub locking: LockingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: DetectionWeights::default(),
            thresholds: RiskThresholds::default(),
            outside_zone_penalty: 20.0,
            mock_location: MockLocationConfig::default(),
            gps_accuracy: GpsAccuracyConfig::default(),
            travel: TravelConfig::default(),
            coordinates: CoordinateConfig::default(),
            fake_gps_denylist: DEFAULT_FAKE_GPS_PACKAGES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            network: NetworkConfig::default(),
            policy: PolicyConfig::default(),
            whitelist: WhitelistConfig::default(),
            timeouts: TimeoutConfig::default(),
            zone_cache_staleness_secs: 60,
            locking: LockingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set detector weights.
    #[must_use]
    pub const fn with_weights(mut self, weights: DetectionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set risk thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the outside-zone penalty.
    #[must_use]
    pub const fn with_outside_zone_penalty(mut self, penalty: f64) -> Self {
        self.outside_zone_penalty = penalty;
        self
    }

    /// Set the travel settings.
    #[must_use]
    pub const fn with_travel(mut self, travel: TravelConfig) -> Self {
        self.travel = travel;
        self
    }

    /// Set the accuracy band.
    #[must_use]
    pub const fn with_gps_accuracy(mut self, band: GpsAccuracyConfig) -> Self {
        self.gps_accuracy = band;
        self
    }

    /// Set the policy settings.
    #[must_use]
    pub const fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Set the whitelist.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: WhitelistConfig) -> Self {
        self.whitelist = whitelist;
        self
    }

    /// Replace the fake-GPS package denylist.
    #[must_use]
    pub fn with_fake_gps_denylist<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fake_gps_denylist = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Set the static IP denylist.
    #[must_use]
    pub fn with_ip_denylist(mut self, ips: Vec<IpAddr>) -> Self {
        self.network.ip_denylist = ips;
        self
    }

    /// Set dependency timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the zone cache staleness window.
    #[must_use]
    pub const fn with_zone_cache_staleness_secs(mut self, secs: u64) -> Self {
        self.zone_cache_staleness_secs = secs;
        self
    }

    /// Set the per-user lock settings.
    #[must_use]
    pub const fn with_locking(mut self, locking: LockingConfig) -> Self {
        self.locking = locking;
        self
    }

    /// Zone cache staleness window as a duration.
    #[must_use]
    pub const fn zone_cache_staleness(&self) -> Duration {
        Duration::from_secs(self.zone_cache_staleness_secs)
    }

    /// Check the snapshot for values no evaluation could work with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found:
    /// - [`ConfigError::InvalidWeight`] for a negative or non-finite weight
    /// - [`ConfigError::NoWeights`] when every weight is zero
    /// - [`ConfigError::ThresholdsNotOrdered`] unless `0 <= medium < high < critical`
    /// - [`ConfigError::InvalidValue`] for any other out-of-range setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut any_positive = false;
        for kind in DetectorKind::ALL {
            let value = self.weights.weight_for(kind);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    detector: kind.name(),
                    value,
                });
            }
            any_positive |= value > 0.0;
        }
        if !any_positive {
            return Err(ConfigError::NoWeights);
        }

        let RiskThresholds {
            medium,
            high,
            critical,
        } = self.thresholds;
        let finite = medium.is_finite() && high.is_finite() && critical.is_finite();
        if !finite || medium < 0.0 || medium >= high || high >= critical {
            return Err(ConfigError::ThresholdsNotOrdered {
                medium,
                high,
                critical,
            });
        }

        if !self.outside_zone_penalty.is_finite() || self.outside_zone_penalty < 0.0 {
            return Err(ConfigError::invalid(
                "outside_zone_penalty",
                "must be a non-negative number",
            ));
        }

        if !self.mock_location.min_accuracy_meters.is_finite()
            || self.mock_location.min_accuracy_meters < 0.0
        {
            return Err(ConfigError::invalid(
                "mock_location.min_accuracy_meters",
                "must be a non-negative number",
            ));
        }

        let band = self.gps_accuracy;
        if !band.min_accuracy_meters.is_finite()
            || !band.max_accuracy_meters.is_finite()
            || band.min_accuracy_meters < 0.0
            || band.min_accuracy_meters > band.max_accuracy_meters
        {
            return Err(ConfigError::invalid(
                "gps_accuracy",
                format!(
                    "band [{}, {}] is not a valid range",
                    band.min_accuracy_meters, band.max_accuracy_meters
                ),
            ));
        }

        if !self.travel.max_speed_kmh.is_finite() || self.travel.max_speed_kmh <= 0.0 {
            return Err(ConfigError::invalid(
                "travel.max_speed_kmh",
                "must be greater than zero",
            ));
        }

        if !(1..=15).contains(&self.coordinates.max_decimal_places) {
            return Err(ConfigError::invalid(
                "coordinates.max_decimal_places",
                "must be between 1 and 15",
            ));
        }
        if self.coordinates.repeating_digit_run < 2 {
            return Err(ConfigError::invalid(
                "coordinates.repeating_digit_run",
                "must be at least 2",
            ));
        }

        if self.policy.auto_block_on_critical && self.policy.critical_block_hours == 0 {
            return Err(ConfigError::invalid(
                "policy.critical_block_hours",
                "must be positive when auto-blocking",
            ));
        }
        if self.policy.critical_block_hours > MAX_CRITICAL_BLOCK_HOURS {
            return Err(ConfigError::invalid(
                "policy.critical_block_hours",
                format!("must be at most {MAX_CRITICAL_BLOCK_HOURS}"),
            ));
        }

        for (field, value) in self.timeouts.entries() {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if self.locking.acquire_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "locking.acquire_timeout_ms",
                "must be greater than zero",
            ));
        }

        for place in &self.whitelist.trusted_locations {
            if !place.center.is_in_range()
                || !place.radius_meters.is_finite()
                || place.radius_meters < 0.0
            {
                return Err(ConfigError::invalid(
                    "whitelist.trusted_locations",
                    format!("trusted location '{}' is malformed", place.name),
                ));
            }
        }

        Ok(())
    }
}
