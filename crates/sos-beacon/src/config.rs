//! Configuration management for sos-beacon.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "sos-beacon";

/// Default settings database file name.
const DATABASE_FILE_NAME: &str = "settings.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SOSBEACON_`, `__` between levels)
/// 2. TOML config file at `~/.config/sos-beacon/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Append log configuration.
    pub logs: LogsConfig,
    /// Settings store configuration.
    pub store: StoreConfig,
    /// Shake detection configuration.
    pub motion: MotionConfig,
    /// Countdown configuration.
    pub countdown: CountdownConfig,
    /// Alert dispatch configuration.
    pub dispatch: DispatchConfig,
    /// Feature switches.
    pub features: FeatureConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Directory holding the JSON logs.
    /// Defaults to `~/.local/share/sos-beacon`
    pub data_dir: Option<PathBuf>,
    /// Directory for uploaded recordings.
    /// Defaults to `<data_dir>/uploads`
    pub uploads_dir: Option<PathBuf>,
    /// Directory of static files served as a fallback, if any.
    pub static_dir: Option<PathBuf>,
    /// Largest accepted upload body in bytes.
    pub max_upload_bytes: usize,
}

/// Append log configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// File name of the SOS event log.
    pub sos_file: String,
    /// File name of the motion sample log.
    pub shake_file: String,
    /// Number of motion samples retained (oldest evicted first).
    pub max_motion_entries: usize,
}

/// Settings store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the settings database.
    /// Defaults to `~/.local/share/sos-beacon/settings.db`
    pub database_path: Option<PathBuf>,
}

/// Shake detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Magnitude above which samples are logged.
    pub noise_floor: f64,
    /// Magnitude above which a shake is detected.
    pub shake_threshold: f64,
    /// Minimum time between two shake events in milliseconds.
    pub debounce_ms: u64,
}

/// Countdown configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    /// Number of ticks before a manual SOS is sent.
    pub duration_secs: u32,
    /// Length of one tick in milliseconds.
    pub tick_ms: u64,
}

/// Alert dispatch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How long to wait for a location fix in milliseconds.
    pub location_timeout_ms: u64,
    /// Base URL of the alert log server. Local files are used when unset.
    pub server_url: Option<String>,
    /// Open messaging links with the system handler. When off, links are
    /// only listed for the user to open.
    pub open_links: bool,
    /// Program used to open links. Platform default when unset.
    pub open_command: Option<String>,
    /// Prefix of the map link; coordinates are appended.
    pub map_url: String,
    /// Prefix of the messaging link; the phone digits are appended.
    pub messaging_url: String,
    /// Fixed latitude reported as the device location.
    pub latitude: Option<f64>,
    /// Fixed longitude reported as the device location.
    pub longitude: Option<f64>,
}

/// Feature switches for the contact book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Seed the default contacts on first run.
    pub auto_load_default_contacts: bool,
    /// Allow adding, removing and resetting contacts.
    pub allow_contact_management: bool,
    /// Allow saving and resetting the profile.
    pub allow_profile_editing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_dir: None,
            uploads_dir: None,
            static_dir: None,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            sos_file: "sos_log.json".to_string(),
            shake_file: "shake_intensity_log.json".to_string(),
            max_motion_entries: 1000,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            noise_floor: 5.0,
            shake_threshold: 15.0,
            debounce_ms: 2000,
        }
    }
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            duration_secs: 3,
            tick_ms: 1000,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            location_timeout_ms: 5000,
            server_url: None,
            open_links: true,
            open_command: None,
            map_url: "https://www.google.com/maps?q=".to_string(),
            messaging_url: "https://wa.me/".to_string(),
            latitude: None,
            longitude: None,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            auto_load_default_contacts: true,
            allow_contact_management: true,
            allow_profile_editing: true,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("SOSBEACON_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.motion.noise_floor < 0.0 {
            return Err(Error::ConfigValidation {
                message: "noise_floor cannot be negative".to_string(),
            });
        }

        if self.motion.shake_threshold <= self.motion.noise_floor {
            return Err(Error::ConfigValidation {
                message: format!(
                    "shake_threshold ({}) must be greater than noise_floor ({})",
                    self.motion.shake_threshold, self.motion.noise_floor
                ),
            });
        }

        if self.countdown.duration_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "duration_secs must be greater than 0".to_string(),
            });
        }

        if self.countdown.tick_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "tick_ms must be greater than 0".to_string(),
            });
        }

        if self.logs.max_motion_entries == 0 {
            return Err(Error::ConfigValidation {
                message: "max_motion_entries must be greater than 0".to_string(),
            });
        }

        if let Some(url) = &self.dispatch.server_url {
            let scheme_ok = Url::parse(url)
                .is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https"));
            if !scheme_ok {
                return Err(Error::ConfigValidation {
                    message: format!("server_url must be an http(s) URL: {url}"),
                });
            }
        }

        if self.dispatch.latitude.is_some() != self.dispatch.longitude.is_some() {
            return Err(Error::ConfigValidation {
                message: "latitude and longitude must be set together".to_string(),
            });
        }

        Ok(())
    }

    /// Get the address the server binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid server address: {}", self.server.host),
            })
    }

    /// Get the data directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.server
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the uploads directory, resolving defaults if not set.
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.server
            .uploads_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("uploads"))
    }

    /// Get the SOS log path.
    #[must_use]
    pub fn sos_log_path(&self) -> PathBuf {
        self.data_dir().join(&self.logs.sos_file)
    }

    /// Get the motion sample log path.
    #[must_use]
    pub fn shake_log_path(&self) -> PathBuf {
        self.data_dir().join(&self.logs.shake_file)
    }

    /// Get the settings database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the debounce window as a Duration.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.motion.debounce_ms)
    }

    /// Get the countdown tick as a Duration.
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.countdown.tick_ms)
    }

    /// Get the location timeout as a Duration.
    #[must_use]
    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch.location_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logs.max_motion_entries, 1000);
        assert_eq!(config.countdown.duration_secs, 3);
        assert!(config.features.auto_load_default_contacts);
        assert!(config.features.allow_contact_management);
        assert!(config.features.allow_profile_editing);
    }

    #[test]
    fn test_default_motion_config() {
        let motion = MotionConfig::default();

        assert!((motion.noise_floor - 5.0).abs() < f64::EPSILON);
        assert!((motion.shake_threshold - 15.0).abs() < f64::EPSILON);
        assert_eq!(motion.debounce_ms, 2000);
    }

    #[test]
    fn test_default_dispatch_config() {
        let dispatch = DispatchConfig::default();

        assert_eq!(dispatch.location_timeout_ms, 5000);
        assert!(dispatch.server_url.is_none());
        assert!(dispatch.open_links);
        assert_eq!(dispatch.messaging_url, "https://wa.me/");
        assert_eq!(dispatch.map_url, "https://www.google.com/maps?q=");
    }

    #[test]
    fn test_default_log_files() {
        let logs = LogsConfig::default();

        assert_eq!(logs.sos_file, "sos_log.json");
        assert_eq!(logs.shake_file, "shake_intensity_log.json");
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_threshold_below_noise_floor() {
        let mut config = Config::default();
        config.motion.shake_threshold = 4.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("shake_threshold"));
    }

    #[test]
    fn test_validate_zero_countdown() {
        let mut config = Config::default();
        config.countdown.duration_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duration_secs"));
    }

    #[test]
    fn test_validate_zero_tick() {
        let mut config = Config::default();
        config.countdown.tick_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("tick_ms"));
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.logs.max_motion_entries = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_motion_entries"));
    }

    #[test]
    fn test_validate_bad_server_url() {
        let mut config = Config::default();
        config.dispatch.server_url = Some("localhost:3000".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("server_url"));

        for bad in ["ftp://localhost:3000", "http://", "not a url"] {
            config.dispatch.server_url = Some(bad.to_string());
            assert!(config.validate().is_err(), "{bad}");
        }

        config.dispatch.server_url = Some("http://localhost:3000".to_string());
        assert!(config.validate().is_ok());

        config.dispatch.server_url = Some("https://alerts.example.org/".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_half_location() {
        let mut config = Config::default();
        config.dispatch.latitude = Some(12.97);

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("latitude"));
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        assert_eq!(config.socket_addr().unwrap().port(), 3000);

        let mut bad = Config::default();
        bad.server.host = "not an address".to_string();
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn test_log_paths_follow_data_dir() {
        let mut config = Config::default();
        config.server.data_dir = Some(PathBuf::from("/srv/sos"));

        assert_eq!(config.sos_log_path(), PathBuf::from("/srv/sos/sos_log.json"));
        assert_eq!(
            config.shake_log_path(),
            PathBuf::from("/srv/sos/shake_intensity_log.json")
        );
        assert_eq!(config.uploads_dir(), PathBuf::from("/srv/sos/uploads"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config.database_path().to_string_lossy().contains("settings.db"));
    }

    #[test]
    fn test_durations() {
        let config = Config::default();

        assert_eq!(config.debounce(), Duration::from_millis(2000));
        assert_eq!(config.tick(), Duration::from_secs(1));
        assert_eq!(config.location_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("sos-beacon"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[motion]\nshake_threshold = 20.0\n\n[countdown]\nduration_secs = 5\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert!((config.motion.shake_threshold - 20.0).abs() < f64::EPSILON);
        assert_eq!(config.countdown.duration_secs, 5);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_motion_config_deserialize() {
        let json = r#"{"shake_threshold": 12.5}"#;
        let motion: MotionConfig = serde_json::from_str(json).unwrap();
        assert!((motion.shake_threshold - 12.5).abs() < f64::EPSILON);
        assert_eq!(motion.debounce_ms, 2000);
    }
}
