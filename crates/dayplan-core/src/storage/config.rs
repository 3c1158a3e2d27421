//! TOML-based application configuration.
//!
//! Holds machine-level settings the scheduler needs before it can talk to
//! anything: which user to schedule for by default, how far ahead to scan,
//! and where the external services live. Per-user scheduling preferences
//! are data, not configuration, and live in the database instead.
//!
//! Stored at `~/.config/dayplan/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::services::travel;
use crate::services::weather;

/// Scheduling-engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// User scheduled when the CLI gives no --user flag.
    #[serde(default = "default_user")]
    pub default_user: String,
    /// Days scanned for a free slot before falling back.
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,
}

/// External service endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_weather_forecast_url")]
    pub weather_forecast_url: String,
    #[serde(default = "default_weather_geocode_url")]
    pub weather_geocode_url: String,
    #[serde(default = "default_travel_url")]
    pub travel_url: String,
    /// GraphHopper API key; routing degrades to flat estimates without one.
    #[serde(default)]
    pub travel_api_key: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/dayplan/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

// Default functions
fn default_user() -> String {
    "local".into()
}
fn default_lookahead_days() -> u32 {
    14
}
fn default_weather_forecast_url() -> String {
    weather::DEFAULT_FORECAST_URL.into()
}
fn default_weather_geocode_url() -> String {
    weather::DEFAULT_GEOCODE_URL.into()
}
fn default_travel_url() -> String {
    travel::DEFAULT_BASE_URL.into()
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_user: default_user(),
            lookahead_days: default_lookahead_days(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            weather_forecast_url: default_weather_forecast_url(),
            weather_geocode_url: default_weather_geocode_url(),
            travel_url: default_travel_url(),
            travel_api_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduling: SchedulingConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the default config cannot be written.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|err| {
                    ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: err.to_string(),
                    }
                })?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|err| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        std::fs::write(path, content).map_err(|err| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning the default on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
