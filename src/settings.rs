use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str =
    "https://www.courseseeker.edu.au/search-engine/courses/course/_search";
const DEFAULT_CONFIG_FILE: &str = "harvester";
const ENV_PREFIX: &str = "HARVEST";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderKind {
    Nominatim,
    #[value(name = "opencage")]
    OpenCage,
}

/// Run configuration. Layered: defaults, then `harvester.toml` (or the file
/// passed with `--config`), then `HARVEST_*` variables, then CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    pub page_size: usize,
    pub start_from: usize,
    /// Stop once this many rows are collected. `None` runs until an empty page.
    pub target_count: Option<usize>,
    pub output: PathBuf,
    pub fetch_details: bool,
    pub geocode: bool,
    pub geocoder: GeocoderKind,
    pub geocoder_url: Option<String>,
    pub geocoder_key: Option<String>,
    pub geocode_timeout_secs: u64,
    pub geocode_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            page_size: 50,
            start_from: 0,
            target_count: None,
            output: PathBuf::from("courses.csv"),
            fetch_details: true,
            geocode: true,
            geocoder: GeocoderKind::Nominatim,
            geocoder_url: None,
            geocoder_key: None,
            geocode_timeout_secs: 10,
            geocode_interval_ms: 1000,
            request_timeout_secs: 30,
            user_agent: concat!("course_harvester/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |key: &'static str, reason: &str| -> Result<(), SettingsError> {
            Err(SettingsError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };

        if self.endpoint.trim().is_empty() {
            return invalid("endpoint", "must not be empty");
        }
        if self.page_size == 0 {
            return invalid("page_size", "must be at least 1");
        }
        if self.request_timeout_secs == 0 || self.geocode_timeout_secs == 0 {
            return invalid("timeout", "timeouts must be at least one second");
        }
        let missing_key = self.geocoder_key.as_deref().map_or(true, |k| k.trim().is_empty());
        if self.geocode && self.geocoder == GeocoderKind::OpenCage && missing_key {
            return invalid("geocoder_key", "the opencage geocoder needs an API key");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert_eq!(s.page_size, 50);
        assert_eq!(s.start_from, 0);
        assert!(s.target_count.is_none());
        assert!(s.fetch_details && s.geocode);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "page_size = 20\ntarget_count = 100\ngeocoder = \"opencage\"\ngeocoder_key = \"k\"\noutput = \"out/x.csv\""
        )
        .unwrap();

        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.page_size, 20);
        assert_eq!(s.target_count, Some(100));
        assert_eq!(s.geocoder, GeocoderKind::OpenCage);
        assert_eq!(s.output, PathBuf::from("out/x.csv"));
        assert_eq!(s.endpoint, DEFAULT_ENDPOINT);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/harvester.toml")));
        assert!(matches!(err, Err(SettingsError::Config(_))));
    }

    #[test]
    fn rejects_zero_page_size() {
        let s = Settings {
            page_size: 0,
            ..Settings::default()
        };
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Invalid { key: "page_size", .. })
        ));
    }

    #[test]
    fn opencage_requires_key_only_when_geocoding() {
        let mut s = Settings {
            geocoder: GeocoderKind::OpenCage,
            ..Settings::default()
        };
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Invalid { key: "geocoder_key", .. })
        ));
        s.geocode = false;
        assert!(s.validate().is_ok());
    }
}
