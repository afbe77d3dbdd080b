//! Engine configuration from environment variables.
//!
//! Start from the defaults, or from the JSON file named by
//! `GEOGUARD_CONFIG_FILE`, then apply any `GEOGUARD_*` override:
//!
//! | Variable | Setting |
//! |---|---|
//! | `GEOGUARD_WEIGHT_<DETECTOR>` | weight of one detector, e.g. `GEOGUARD_WEIGHT_MOCK_LOCATION` |
//! | `GEOGUARD_THRESHOLD_MEDIUM` / `_HIGH` / `_CRITICAL` | risk level boundaries |
//! | `GEOGUARD_OUTSIDE_ZONE_PENALTY` | outside-zone score |
//! | `GEOGUARD_MOCK_MIN_ACCURACY_METERS` | "too perfect" accuracy for the mock detector |
//! | `GEOGUARD_GPS_MIN_ACCURACY_METERS` / `_MAX_ACCURACY_METERS` | plausible accuracy band |
//! | `GEOGUARD_MAX_SPEED_KMH` | impossible travel limit |
//! | `GEOGUARD_DEBOUNCE_WINDOW_SECS` | travel debounce |
//! | `GEOGUARD_MIN_TIME_BETWEEN_LOCATIONS_SECS` | "too frequent" gap |
//! | `GEOGUARD_MAX_DECIMAL_PLACES` / `GEOGUARD_REPEATING_DIGIT_RUN` | coordinate heuristics |
//! | `GEOGUARD_CRITICAL_BLOCK_HOURS` / `GEOGUARD_AUTO_BLOCK_ON_CRITICAL` | enforcement |
//! | `GEOGUARD_ZONE_CACHE_STALENESS_SECS` | zone cache window |
//! | `GEOGUARD_LOCK_ACQUIRE_TIMEOUT_MS` / `GEOGUARD_LOCK_RETRIES` | per-user lock |
//! | `GEOGUARD_TIMEOUT_<DEPENDENCY>_MS` | zone_directory, history, recorder, alert, reputation, whitelist |
//! | `GEOGUARD_FAKE_GPS_DENYLIST` | comma-separated packages (replaces the list) |
//! | `GEOGUARD_IP_DENYLIST` | comma-separated IPs |
//! | `GEOGUARD_WHITELIST_USERS` / `_DEVICES` / `_IPS` | comma-separated trusted entries |
//!
//! Unset or empty variables leave the setting alone. A value that does not
//! parse is an error, never silently ignored.

use crate::error::{EngineError, Result};
use geoguard_core::config::{ConfigError, EngineConfig};
use geoguard_core::detectors::DetectorKind;
use geoguard_core::model::UserId;
use std::fmt::Display;
use std::net::IpAddr;
use std::str::FromStr;

/// Path of an optional JSON configuration file.
pub const CONFIG_FILE_VAR: &str = "GEOGUARD_CONFIG_FILE";

/// Redis connection URL for the history store.
pub const REDIS_URL_VAR: &str = "GEOGUARD_REDIS_URL";

/// PostgreSQL connection URL for the recorder and zone directory.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Load and validate the engine configuration from the process environment.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfiguration`] if the file or a variable
/// cannot be parsed, or the result fails validation.
pub fn config_from_env() -> Result<EngineConfig> {
    config_from_lookup(|key| std::env::var(key).ok())
}

/// Load and validate the engine configuration from `lookup`.
///
/// `lookup` maps a variable name to its value; [`config_from_env`] passes
/// the process environment.
///
/// # Errors
///
/// Same as [`config_from_env`].
pub fn config_from_lookup<F>(lookup: F) -> Result<EngineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars { lookup };

    let mut config = match vars.get(CONFIG_FILE_VAR) {
        Some(path) => read_file(&path)?,
        None => EngineConfig::default(),
    };

    for kind in DetectorKind::ALL {
        let key = format!("GEOGUARD_WEIGHT_{}", kind.name().to_ascii_uppercase());
        if let Some(weight) = vars.parse::<f64>(&key)? {
            config.weights = config.weights.with_weight(kind, weight);
        }
    }

    vars.apply("GEOGUARD_THRESHOLD_MEDIUM", &mut config.thresholds.medium)?;
    vars.apply("GEOGUARD_THRESHOLD_HIGH", &mut config.thresholds.high)?;
    vars.apply("GEOGUARD_THRESHOLD_CRITICAL", &mut config.thresholds.critical)?;
    vars.apply("GEOGUARD_OUTSIDE_ZONE_PENALTY", &mut config.outside_zone_penalty)?;

    vars.apply(
        "GEOGUARD_MOCK_MIN_ACCURACY_METERS",
        &mut config.mock_location.min_accuracy_meters,
    )?;
    vars.apply(
        "GEOGUARD_GPS_MIN_ACCURACY_METERS",
        &mut config.gps_accuracy.min_accuracy_meters,
    )?;
    vars.apply(
        "GEOGUARD_GPS_MAX_ACCURACY_METERS",
        &mut config.gps_accuracy.max_accuracy_meters,
    )?;

    vars.apply("GEOGUARD_MAX_SPEED_KMH", &mut config.travel.max_speed_kmh)?;
    vars.apply(
        "GEOGUARD_DEBOUNCE_WINDOW_SECS",
        &mut config.travel.debounce_window_secs,
    )?;
    vars.apply(
        "GEOGUARD_MIN_TIME_BETWEEN_LOCATIONS_SECS",
        &mut config.travel.min_time_between_locations_secs,
    )?;

    vars.apply(
        "GEOGUARD_MAX_DECIMAL_PLACES",
        &mut config.coordinates.max_decimal_places,
    )?;
    vars.apply(
        "GEOGUARD_REPEATING_DIGIT_RUN",
        &mut config.coordinates.repeating_digit_run,
    )?;

    vars.apply(
        "GEOGUARD_CRITICAL_BLOCK_HOURS",
        &mut config.policy.critical_block_hours,
    )?;
    vars.apply(
        "GEOGUARD_AUTO_BLOCK_ON_CRITICAL",
        &mut config.policy.auto_block_on_critical,
    )?;

    vars.apply(
        "GEOGUARD_ZONE_CACHE_STALENESS_SECS",
        &mut config.zone_cache_staleness_secs,
    )?;
    vars.apply(
        "GEOGUARD_LOCK_ACQUIRE_TIMEOUT_MS",
        &mut config.locking.acquire_timeout_ms,
    )?;
    vars.apply("GEOGUARD_LOCK_RETRIES", &mut config.locking.retries)?;

    let timeouts = &mut config.timeouts;
    vars.apply("GEOGUARD_TIMEOUT_ZONE_DIRECTORY_MS", &mut timeouts.zone_directory_ms)?;
    vars.apply("GEOGUARD_TIMEOUT_HISTORY_MS", &mut timeouts.history_ms)?;
    vars.apply("GEOGUARD_TIMEOUT_RECORDER_MS", &mut timeouts.recorder_ms)?;
    vars.apply("GEOGUARD_TIMEOUT_ALERT_MS", &mut timeouts.alert_ms)?;
    vars.apply("GEOGUARD_TIMEOUT_REPUTATION_MS", &mut timeouts.reputation_ms)?;
    vars.apply("GEOGUARD_TIMEOUT_WHITELIST_MS", &mut timeouts.whitelist_ms)?;

    if let Some(packages) = vars.list::<String>("GEOGUARD_FAKE_GPS_DENYLIST")? {
        config.fake_gps_denylist = packages;
    }
    if let Some(ips) = vars.list::<IpAddr>("GEOGUARD_IP_DENYLIST")? {
        config.network.ip_denylist = ips;
    }
    if let Some(users) = vars.list::<String>("GEOGUARD_WHITELIST_USERS")? {
        config.whitelist.user_ids = users.into_iter().map(UserId::from).collect();
    }
    if let Some(devices) = vars.list::<String>("GEOGUARD_WHITELIST_DEVICES")? {
        config.whitelist.device_ids = devices;
    }
    if let Some(ips) = vars.list::<IpAddr>("GEOGUARD_WHITELIST_IPS")? {
        config.whitelist.ip_addresses = ips;
    }

    config.validate()?;
    tracing::debug!(
        outside_zone_penalty = config.outside_zone_penalty,
        critical_threshold = config.thresholds.critical,
        auto_block = config.policy.auto_block_on_critical,
        "Engine configuration loaded"
    );
    Ok(config)
}

/// Redis URL from `GEOGUARD_REDIS_URL`.
///
/// # Errors
///
/// Returns [`EngineError::MissingDependency`] if the variable is unset.
pub fn redis_url() -> Result<String> {
    required(|key| std::env::var(key).ok(), REDIS_URL_VAR)
}

/// PostgreSQL URL from `DATABASE_URL`.
///
/// # Errors
///
/// Returns [`EngineError::MissingDependency`] if the variable is unset.
pub fn database_url() -> Result<String> {
    required(|key| std::env::var(key).ok(), DATABASE_URL_VAR)
}

fn required<F>(lookup: F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    Vars { lookup }
        .get(key)
        .ok_or_else(|| EngineError::MissingDependency(format!("{key} is not set")))
}

fn read_file(path: &str) -> Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Parse(format!("{path}: {e}")))?;
    let config = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::Parse(format!("{path}: {e}")))?;
    tracing::info!(path, "Read engine configuration file");
    Ok(config)
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed, non-empty value.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T>(&self, key: &str) -> std::result::Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| parse_value(key, &raw))
            .transpose()
    }

    fn apply<T>(&self, key: &str, target: &mut T) -> std::result::Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        if let Some(value) = self.parse(key)? {
            *target = value;
        }
        Ok(())
    }

    /// Comma-separated list; blank items are skipped.
    fn list<T>(&self, key: &str) -> std::result::Result<Option<Vec<T>>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| parse_value(key, item))
                    .collect()
            })
            .transpose()
    }
}

fn parse_value<T>(key: &str, raw: &str) -> std::result::Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ConfigError::Parse(format!("{key}={raw:?}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = config_from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_scalar_overrides() {
        let config = config_from_lookup(lookup(&[
            ("GEOGUARD_WEIGHT_DEVICE_INTEGRITY", "50"),
            ("GEOGUARD_THRESHOLD_CRITICAL", "95"),
            ("GEOGUARD_OUTSIDE_ZONE_PENALTY", " 25.5 "),
            ("GEOGUARD_MAX_SPEED_KMH", "900"),
            ("GEOGUARD_AUTO_BLOCK_ON_CRITICAL", "false"),
            ("GEOGUARD_TIMEOUT_HISTORY_MS", "750"),
            ("GEOGUARD_LOCK_RETRIES", "3"),
        ]))
        .unwrap();

        assert!((config.weights.device_integrity - 50.0).abs() < f64::EPSILON);
        assert!((config.thresholds.critical - 95.0).abs() < f64::EPSILON);
        assert!((config.outside_zone_penalty - 25.5).abs() < f64::EPSILON);
        assert!((config.travel.max_speed_kmh - 900.0).abs() < f64::EPSILON);
        assert!(!config.policy.auto_block_on_critical);
        assert_eq!(config.timeouts.history_ms, 750);
        assert_eq!(config.locking.retries, 3);
    }

    #[test]
    fn test_lists_are_comma_separated() {
        let config = config_from_lookup(lookup(&[
            ("GEOGUARD_IP_DENYLIST", "10.0.0.1, 192.168.1.7,"),
            ("GEOGUARD_WHITELIST_USERS", "kiosk-1,kiosk-2"),
            ("GEOGUARD_FAKE_GPS_DENYLIST", "com.example.spoofer"),
        ]))
        .unwrap();

        assert_eq!(config.network.ip_denylist.len(), 2);
        assert_eq!(
            config.whitelist.user_ids,
            vec![UserId::new("kiosk-1"), UserId::new("kiosk-2")]
        );
        assert_eq!(config.fake_gps_denylist, vec!["com.example.spoofer".to_string()]);
    }

    #[test]
    fn test_unparseable_value_is_an_error() {
        let err = config_from_lookup(lookup(&[("GEOGUARD_MAX_SPEED_KMH", "fast")])).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidConfiguration(ConfigError::Parse(ref msg))
                if msg.contains("GEOGUARD_MAX_SPEED_KMH")
        ));

        let err = config_from_lookup(lookup(&[("GEOGUARD_IP_DENYLIST", "10.0.0.1,nope")])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(ConfigError::Parse(_))));
    }

    #[test]
    fn test_result_is_validated() {
        let err = config_from_lookup(lookup(&[("GEOGUARD_THRESHOLD_HIGH", "10")])).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidConfiguration(ConfigError::ThresholdsNotOrdered { .. })
        ));

        let err = config_from_lookup(lookup(&[(
            "GEOGUARD_CRITICAL_BLOCK_HOURS",
            "18446744073709551",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidConfiguration(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_config_file_is_a_parse_error() {
        let err = config_from_lookup(lookup(&[(
            CONFIG_FILE_VAR,
            "/nonexistent/geoguard/config.json",
        )]))
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(ConfigError::Parse(_))));
    }

    #[test]
    fn test_required_url() {
        assert_eq!(
            required(lookup(&[(REDIS_URL_VAR, "redis://localhost")]), REDIS_URL_VAR).unwrap(),
            "redis://localhost"
        );
        assert!(matches!(
            required(lookup(&[]), REDIS_URL_VAR),
            Err(EngineError::MissingDependency(_))
        ));
    }
}
