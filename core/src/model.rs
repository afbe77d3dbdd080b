//! Data model for location samples and work zones.
//!
//! A [`LocationSample`] is what a client submits at check-in or check-out.
//! It is never mutated after construction; every stage of an evaluation
//! borrows it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// User identifier.
///
/// Opaque to the engine; the attendance system decides its format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Create a user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Work zone identifier.
///
/// Ordered so that equidistant zones resolve to the lowest id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u64);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which attendance action the sample was submitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceType {
    /// Start of a shift.
    CheckIn,
    /// End of a shift.
    CheckOut,
}

impl AttendanceType {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::CheckOut => "check_out",
        }
    }
}

impl fmt::Display for AttendanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an attendance type string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown attendance type: {0}")]
pub struct ParseAttendanceTypeError(pub String);

impl FromStr for AttendanceType {
    type Err = ParseAttendanceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "check_in" | "checkin" | "in" => Ok(Self::CheckIn),
            "check_out" | "checkout" | "out" => Ok(Self::CheckOut),
            _ => Err(ParseAttendanceTypeError(s.to_string())),
        }
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude, valid range -90..=90.
    pub latitude: f64,
    /// Longitude, valid range -180..=180.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `true` for the (0, 0) "null island" placeholder many broken clients send.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_null_island(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// `true` when both components are finite and inside their valid ranges.
    #[must_use]
    pub fn is_in_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Device integrity signals reported by the client.
///
/// Collected on the device (Play Integrity, `SafetyNet`, jailbreak checks,
/// settings probes). Every flag defaults to "not observed"; a missing
/// fingerprint as a whole means detectors report insufficient data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeviceFingerprint {
    /// Stable device identifier, if the client exposes one.
    pub device_id: Option<String>,

    /// Android root detected.
    pub is_rooted: bool,

    /// iOS jailbreak detected.
    pub is_jailbroken: bool,

    /// Running on an emulator or simulator.
    pub is_emulator: bool,

    /// Developer options switched on.
    pub developer_mode_enabled: bool,

    /// USB debugging switched on.
    pub usb_debugging_enabled: bool,

    /// Installation from unknown sources allowed.
    pub unknown_sources_enabled: bool,

    /// "Allow mock locations" or a mock provider is active.
    pub mock_location_enabled: bool,

    /// Result of the platform integrity attestation, `None` when not run.
    pub system_integrity: Option<bool>,

    /// Package identifiers of installed apps the client chose to report.
    pub installed_apps: Vec<String>,

    /// Additional client-specific fields.
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

/// Network context of the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkInfo {
    /// Client IP address as seen by the server.
    pub ip_address: Option<IpAddr>,

    /// Client or edge reported a VPN.
    pub is_vpn: bool,

    /// Request arrived through a proxy.
    pub is_proxy: bool,

    /// Request arrived through a Tor exit node.
    pub is_tor: bool,
}

/// One GPS reading submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// Horizontal accuracy radius in meters, if reported.
    pub accuracy_meters: Option<f64>,

    /// Altitude in meters.
    pub altitude: Option<f64>,

    /// Ground speed in m/s.
    pub speed: Option<f64>,

    /// Heading in degrees from true north.
    pub heading: Option<f64>,

    /// When the fix was taken.
    pub captured_at: DateTime<Utc>,

    /// Location provider tag (`gps`, `network`, `fused`, `mock`, ...).
    pub provider: Option<String>,

    /// Device integrity signals.
    pub device_fingerprint: Option<DeviceFingerprint>,

    /// Network context.
    pub network_info: Option<NetworkInfo>,
}

impl LocationSample {
    /// Create a sample with only a position and a timestamp.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters: None,
            altitude: None,
            speed: None,
            heading: None,
            captured_at,
            provider: None,
            device_fingerprint: None,
            network_info: None,
        }
    }

    /// Set the reported accuracy.
    #[must_use]
    pub const fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy_meters = Some(meters);
        self
    }

    /// Set the altitude.
    #[must_use]
    pub const fn with_altitude(mut self, meters: f64) -> Self {
        self.altitude = Some(meters);
        self
    }

    /// Set the ground speed.
    #[must_use]
    pub const fn with_speed(mut self, meters_per_second: f64) -> Self {
        self.speed = Some(meters_per_second);
        self
    }

    /// Set the heading.
    #[must_use]
    pub const fn with_heading(mut self, degrees: f64) -> Self {
        self.heading = Some(degrees);
        self
    }

    /// Set the provider tag.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach device integrity signals.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: DeviceFingerprint) -> Self {
        self.device_fingerprint = Some(fingerprint);
        self
    }

    /// Attach network context.
    #[must_use]
    pub const fn with_network(mut self, network: NetworkInfo) -> Self {
        self.network_info = Some(network);
        self
    }

    /// Position of the fix.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Device id from the fingerprint, if any.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_fingerprint
            .as_ref()
            .and_then(|f| f.device_id.as_deref())
    }

    /// Client IP from the network context, if any.
    #[must_use]
    pub fn ip_address(&self) -> Option<IpAddr> {
        self.network_info.as_ref().and_then(|n| n.ip_address)
    }
}

/// The most recent fix stored for a user.
///
/// Used only for the impossible travel comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastKnownFix {
    /// The sample as it was submitted.
    pub sample: LocationSample,
    /// Server time at which it was stored.
    pub recorded_at: DateTime<Utc>,
}

impl LastKnownFix {
    /// Wrap a sample stored at `recorded_at`.
    #[must_use]
    pub const fn new(sample: LocationSample, recorded_at: DateTime<Utc>) -> Self {
        Self {
            sample,
            recorded_at,
        }
    }

    /// When the stored fix was taken by the device.
    #[must_use]
    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.sample.captured_at
    }

    /// Position of the stored fix.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        self.sample.coordinate()
    }
}

/// An authorized work location.
///
/// Zones are circles. They are maintained by admin tooling outside the
/// engine and only ever read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkZone {
    /// Zone id.
    pub id: ZoneId,

    /// Display name.
    pub name: String,

    /// Center of the circle.
    pub center: Coordinate,

    /// Radius in meters.
    pub radius_meters: f64,

    /// Inactive zones are ignored by the directory.
    pub is_active: bool,

    /// Strict zones ignore tolerance and enforce `required_accuracy_meters`.
    pub strict_geofence: bool,

    /// Worst accuracy a strict zone accepts.
    pub required_accuracy_meters: Option<f64>,

    /// Extra meters granted outside the radius for non-strict zones.
    pub tolerance_meters: f64,

    /// Shifts allowed to check in here; empty means any shift.
    pub allowed_shifts: Vec<String>,
}

impl WorkZone {
    /// Create an active, non-strict zone with no tolerance.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>, center: Coordinate, radius_meters: f64) -> Self {
        Self {
            id: ZoneId(id),
            name: name.into(),
            center,
            radius_meters,
            is_active: true,
            strict_geofence: false,
            required_accuracy_meters: None,
            tolerance_meters: 0.0,
            allowed_shifts: Vec::new(),
        }
    }

    /// Make the zone strict, optionally requiring a minimum accuracy.
    #[must_use]
    pub const fn strict(mut self, required_accuracy_meters: Option<f64>) -> Self {
        self.strict_geofence = true;
        self.required_accuracy_meters = required_accuracy_meters;
        self
    }

    /// Grant extra meters outside the radius.
    #[must_use]
    pub const fn with_tolerance(mut self, meters: f64) -> Self {
        self.tolerance_meters = meters;
        self
    }

    /// Restrict the zone to the given shifts.
    #[must_use]
    pub fn with_allowed_shifts<I, S>(mut self, shifts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_shifts = shifts.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the zone inactive.
    #[must_use]
    pub const fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether a request for `shift_id` may use this zone.
    ///
    /// Unrestricted zones accept everyone; restricted zones require a listed
    /// shift.
    #[must_use]
    pub fn permits_shift(&self, shift_id: Option<&str>) -> bool {
        if self.allowed_shifts.is_empty() {
            return true;
        }
        shift_id.is_some_and(|shift| self.allowed_shifts.iter().any(|s| s == shift))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn test_attendance_type_parsing() {
        assert_eq!("check_in".parse::<AttendanceType>(), Ok(AttendanceType::CheckIn));
        assert_eq!("Check-Out".parse::<AttendanceType>(), Ok(AttendanceType::CheckOut));
        assert_eq!("checkin".parse::<AttendanceType>(), Ok(AttendanceType::CheckIn));
        assert!("lunch".parse::<AttendanceType>().is_err());
    }

    #[test]
    fn test_null_island() {
        assert!(Coordinate::new(0.0, 0.0).is_null_island());
        assert!(Coordinate::new(-0.0, 0.0).is_null_island());
        assert!(!Coordinate::new(0.0, 0.000_1).is_null_island());
    }

    #[test]
    fn test_coordinate_range() {
        assert!(Coordinate::new(90.0, -180.0).is_in_range());
        assert!(!Coordinate::new(90.1, 0.0).is_in_range());
        assert!(!Coordinate::new(0.0, 180.5).is_in_range());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_in_range());
    }

    #[test]
    fn test_zone_shift_restriction() {
        let open = WorkZone::new(1, "Lobby", Coordinate::new(0.0, 0.0), 50.0);
        assert!(open.permits_shift(None));
        assert!(open.permits_shift(Some("night")));

        let restricted = open.with_allowed_shifts(["morning"]);
        assert!(restricted.permits_shift(Some("morning")));
        assert!(!restricted.permits_shift(Some("night")));
        assert!(!restricted.permits_shift(None));
    }

    #[test]
    fn test_fingerprint_deserializes_partial_json() {
        let fp: DeviceFingerprint = serde_json::from_str(
            r#"{"is_rooted": true, "installed_apps": ["com.lexa.fakegps"], "battery": 80}"#,
        )
        .unwrap();

        assert!(fp.is_rooted);
        assert!(!fp.is_emulator);
        assert_eq!(fp.system_integrity, None);
        assert_eq!(fp.installed_apps, vec!["com.lexa.fakegps"]);
        assert_eq!(fp.custom.get("battery"), Some(&serde_json::json!(80)));
    }
}
