//! Matching against operator-configured trusted entries.

use crate::config::WhitelistConfig;
use crate::geo::distance_between;
use crate::model::{LocationSample, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Which trusted entry a request matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WhitelistMatch {
    /// The user id is trusted.
    User(UserId),
    /// The device id is trusted.
    Device(String),
    /// The client IP is trusted.
    Ip(IpAddr),
    /// The sample lies inside a trusted location.
    Location(String),
}

impl fmt::Display for WhitelistMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "trusted user {id}"),
            Self::Device(id) => write!(f, "trusted device {id}"),
            Self::Ip(ip) => write!(f, "trusted IP {ip}"),
            Self::Location(name) => write!(f, "trusted location {name}"),
        }
    }
}

/// Look a request up in the whitelist.
///
/// Checks user, device, IP and location in that order and returns the first
/// hit. Trusted locations are inclusive circles; a sample with non-finite
/// coordinates never matches one.
#[must_use]
pub fn match_whitelist(
    config: &WhitelistConfig,
    user_id: &UserId,
    device_id: Option<&str>,
    ip: Option<IpAddr>,
    sample: &LocationSample,
) -> Option<WhitelistMatch> {
    if config.user_ids.contains(user_id) {
        return Some(WhitelistMatch::User(user_id.clone()));
    }

    if let Some(device) = device_id {
        if config.device_ids.iter().any(|d| d == device) {
            return Some(WhitelistMatch::Device(device.to_string()));
        }
    }

    if let Some(ip) = ip {
        if config.ip_addresses.contains(&ip) {
            return Some(WhitelistMatch::Ip(ip));
        }
    }

    let point = sample.coordinate();
    if point.is_in_range() {
        for place in &config.trusted_locations {
            if distance_between(point, place.center) <= place.radius_meters {
                return Some(WhitelistMatch::Location(place.name.clone()));
            }
        }
    }

    None
}
