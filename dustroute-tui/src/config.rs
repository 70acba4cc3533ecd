use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dustroute_core::{
    model::{FillLevel, GeoPoint, SourceId},
    service::RouteSettings,
};
use dustroute_provider_osrm::{DEFAULT_BASE_URL, DEFAULT_PROFILE, OsrmSettings};
use serde::Deserialize;

const ENV_PREFIX: &str = "DUSTROUTE_";

/// Runtime settings, read from `DUSTROUTE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Config {
    #[serde(default = "default_osrm_url")]
    pub osrm_url: String,
    #[serde(default = "default_osrm_profile")]
    pub osrm_profile: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub route_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default = "default_base_lat")]
    pub base_lat: f64,
    #[serde(default = "default_base_lon")]
    pub base_lon: f64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_map_output")]
    pub map_output: PathBuf,
    #[serde(default = "default_bin_source")]
    pub bin_source: String,
    pub telemetry_url: Option<String>,
    pub simulation_seed: Option<u64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_osrm_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_osrm_profile() -> String {
    DEFAULT_PROFILE.to_owned()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_threshold() -> u8 {
    FillLevel::default().percent()
}

// Kolhapur depot
fn default_base_lat() -> f64 {
    16.705
}

fn default_base_lon() -> f64 {
    74.243
}

fn default_refresh_interval_secs() -> u64 {
    20
}

fn default_map_output() -> PathBuf {
    PathBuf::from("map.html")
}

fn default_bin_source() -> String {
    "simulated".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("dustroute.log")
}

impl Config {
    /// Load `.env` if present, then read the environment.
    pub(crate) fn from_env() -> Result<Self> {
        // A missing .env file is fine; variables may come from the shell.
        let _env_file = dotenvy::dotenv();
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("Failed to load config from environment")
    }

    #[cfg(test)]
    fn from_vars(vars: &[(&str, &str)]) -> Result<Self> {
        let pairs = vars
            .iter()
            .map(|(key, value)| (format!("{ENV_PREFIX}{key}"), (*value).to_owned()));
        envy::prefixed(ENV_PREFIX)
            .from_iter(pairs)
            .context("Failed to load config from variables")
    }

    pub(crate) fn route_settings(&self) -> Result<RouteSettings> {
        let base = GeoPoint::new(self.base_lat, self.base_lon)
            .context("Base station coordinates are invalid")?;
        let threshold =
            FillLevel::new(i64::from(self.threshold)).context("Overload threshold is invalid")?;
        Ok(RouteSettings { base, threshold })
    }

    pub(crate) fn osrm_settings(&self) -> OsrmSettings {
        OsrmSettings {
            base_url: self.osrm_url.clone(),
            profile: self.osrm_profile.clone(),
            retries: self.route_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub(crate) fn source_id(&self) -> SourceId {
        SourceId(self.bin_source.trim().to_lowercase())
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub(crate) fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use dustroute_core::model::BinSources;

    use super::*;

    #[test]
    fn defaults_match_kolhapur_demo() {
        let config = Config::from_vars(&[]).expect("defaults load");

        let settings = config.route_settings().expect("valid defaults");
        assert_eq!(settings.threshold.percent(), 80);
        assert_eq!(
            settings.base,
            GeoPoint::new(16.705, 74.243).expect("valid point")
        );
        assert_eq!(config.refresh_interval(), Duration::from_secs(20));
        assert_eq!(config.source_id(), SourceId::from(BinSources::Simulated));
        assert_eq!(config.osrm_settings().retries, 0);
        assert!(config.telemetry_url.is_none(), "telemetry url defaulted");
    }

    #[test]
    fn variables_override_defaults() {
        let config = Config::from_vars(&[
            ("THRESHOLD", "65"),
            ("BIN_SOURCE", " Telemetry "),
            ("TELEMETRY_URL", "http://feed.local/bins"),
            ("ROUTE_RETRIES", "2"),
            ("REFRESH_INTERVAL_SECS", "0"),
        ])
        .expect("overrides load");

        assert_eq!(config.source_id(), SourceId::from(BinSources::Telemetry));
        assert_eq!(config.route_settings().expect("valid").threshold.percent(), 65);
        assert_eq!(config.osrm_settings().retries, 2);
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn invalid_base_station_is_rejected() {
        let config = Config::from_vars(&[("BASE_LAT", "123.0")]).expect("parses");
        assert!(config.route_settings().is_err(), "latitude 123 accepted");

        let config = Config::from_vars(&[("THRESHOLD", "150")]).expect("parses");
        assert!(config.route_settings().is_err(), "threshold 150 accepted");
    }
}
