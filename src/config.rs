/// Service configuration loader - parses propmon.toml
///
/// Keeps the feed endpoint, refresh cadence and delivery options out of the
/// code. Precedence, lowest to highest:
///
/// 1. built-in defaults
/// 2. the TOML file (`propmon.toml` unless told otherwise)
/// 3. environment variables, including those loaded from `.env`
/// 4. command-line flags (applied by the binary)

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::ingest::feed::validate_feed_url;
use crate::model::DEFAULT_FEED_URL;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "propmon.toml";

/// Shortest allowed refresh interval.
pub const MIN_REFRESH_MINUTES: u64 = 10;
/// Longest allowed refresh interval (one day).
pub const MAX_REFRESH_MINUTES: u64 = 1440;

pub const ENV_FEED_URL: &str = "PROPMON_FEED_URL";
pub const ENV_REFRESH_MINUTES: &str = "PROPMON_REFRESH_MINUTES";
pub const ENV_ENDPOINT_PORT: &str = "PROPMON_ENDPOINT_PORT";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything the service reads from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feed_url: String,
    pub refresh_interval_minutes: u64,
    pub request_timeout_seconds: u64,
    /// Port for the status endpoint; `None` leaves it off.
    pub endpoint_port: Option<u16>,
    pub desktop_notifications: bool,
    pub notification_timeout_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            refresh_interval_minutes: 60,
            request_timeout_seconds: 30,
            endpoint_port: None,
            desktop_notifications: true,
            notification_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    #[error(
        "refresh interval must be between {min} and {max} minutes, got {0}",
        min = MIN_REFRESH_MINUTES,
        max = MAX_REFRESH_MINUTES
    )]
    IntervalOutOfRange(u64),

    #[error("{0}")]
    InvalidFeedUrl(String),
}

impl Settings {
    /// Parses settings from TOML text. Absent keys keep their defaults.
    pub fn from_toml_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Applies overrides from a variable lookup.
    ///
    /// Takes the lookup as a closure so tests do not have to touch the
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_FEED_URL) {
            self.feed_url = url;
        }

        if let Some(raw) = lookup(ENV_REFRESH_MINUTES) {
            self.refresh_interval_minutes =
                raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_REFRESH_MINUTES,
                    value: raw.clone(),
                })?;
        }

        if let Some(raw) = lookup(ENV_ENDPOINT_PORT) {
            let port = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_ENDPOINT_PORT,
                value: raw.clone(),
            })?;
            self.endpoint_port = Some(port);
        }

        Ok(())
    }

    /// Checks the interval range and the feed URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_REFRESH_MINUTES..=MAX_REFRESH_MINUTES).contains(&self.refresh_interval_minutes) {
            return Err(ConfigError::IntervalOutOfRange(self.refresh_interval_minutes));
        }

        validate_feed_url(&self.feed_url)
            .map_err(|e| ConfigError::InvalidFeedUrl(e.to_string()))?;

        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Loads settings from `path`, then `.env` and the process environment.
///
/// A missing file is not an error: the defaults are used. A file that
/// exists but does not parse is.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let display = path.display().to_string();

    let mut settings = match fs::read_to_string(path) {
        Ok(contents) => Settings::from_toml_str(&contents, &display)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("{} not found, using defaults", display);
            Settings::default()
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: display,
                source,
            });
        }
    };

    // Load .env file if present
    dotenv::dotenv().ok();
    settings.apply_env(|name| std::env::var(name).ok())?;

    Ok(settings)
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// Read access to the settings the refresh cycle needs.
///
/// Read on every cycle, so an implementation backed by live preferences
/// takes effect on the next refresh.
pub trait SettingsProvider: Send + Sync {
    fn feed_url(&self) -> String;
    fn refresh_interval_minutes(&self) -> u64;
}

impl SettingsProvider for Settings {
    fn feed_url(&self) -> String {
        self.feed_url.clone()
    }

    fn refresh_interval_minutes(&self) -> u64 {
        self.refresh_interval_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.feed_url, DEFAULT_FEED_URL);
        assert_eq!(settings.refresh_interval_minutes, 60);
        assert!(settings.validate().is_ok(), "defaults should validate");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str("refresh_interval_minutes = 30\n", "inline")
            .expect("partial config should parse");
        assert_eq!(settings.refresh_interval_minutes, 30);
        assert_eq!(settings.feed_url, DEFAULT_FEED_URL);
        assert_eq!(settings.endpoint_port, None);
    }

    #[test]
    fn test_full_toml() {
        let toml = r#"
            feed_url = "http://localhost:9000/solar.xml"
            refresh_interval_minutes = 15
            request_timeout_seconds = 5
            endpoint_port = 8090
            desktop_notifications = false
            notification_timeout_ms = 2500
        "#;
        let settings = Settings::from_toml_str(toml, "inline").expect("config should parse");
        assert_eq!(settings.feed_url, "http://localhost:9000/solar.xml");
        assert_eq!(settings.endpoint_port, Some(8090));
        assert!(!settings.desktop_notifications);
        assert_eq!(settings.request_timeout().as_secs(), 5);
        assert_eq!(settings.refresh_interval_minutes, 15);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let result = Settings::from_toml_str("refresh_interval_minutes = \"soon\"", "bad.toml");
        match result {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, "bad.toml"),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env(lookup_from(&[
                (ENV_FEED_URL, "https://mirror.example.org/solarxml.php"),
                (ENV_REFRESH_MINUTES, " 120 "),
                (ENV_ENDPOINT_PORT, "8081"),
            ]))
            .expect("overrides should apply");

        assert_eq!(settings.feed_url, "https://mirror.example.org/solarxml.php");
        assert_eq!(settings.refresh_interval_minutes, 120);
        assert_eq!(settings.endpoint_port, Some(8081));
    }

    #[test]
    fn test_env_override_rejects_non_numeric_interval() {
        let mut settings = Settings::default();
        let result = settings.apply_env(lookup_from(&[(ENV_REFRESH_MINUTES, "hourly")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { name: ENV_REFRESH_MINUTES, .. })
        ));
    }

    #[test]
    fn test_validate_interval_bounds() {
        for (minutes, ok) in [(9, false), (10, true), (1440, true), (1441, false)] {
            let settings = Settings {
                refresh_interval_minutes: minutes,
                ..Settings::default()
            };
            assert_eq!(settings.validate().is_ok(), ok, "interval {} minutes", minutes);
        }
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let settings = Settings {
            feed_url: "hamqsl dot com".to_string(),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidFeedUrl(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = Path::new("definitely/not/here/propmon.toml");
        let settings = load_settings(path).expect("missing file should fall back to defaults");
        assert_eq!(settings.request_timeout_seconds, 30);
    }

    #[test]
    fn test_settings_provider_reads_fields() {
        let settings = Settings {
            refresh_interval_minutes: 45,
            ..Settings::default()
        };
        let provider: &dyn SettingsProvider = &settings;
        assert_eq!(provider.feed_url(), DEFAULT_FEED_URL);
        assert_eq!(provider.refresh_interval_minutes(), 45);
    }
}
