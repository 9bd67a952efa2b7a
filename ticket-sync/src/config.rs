//! Application configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to
//! [`Config::default`]. Durations are written as
//! `{ magnitude = 30, unit = "minutes" }`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::CacheConfig;
use crate::domain::{EventColor, TravelerColor, TravelerColors};
use crate::retry::RetryPolicy;

/// Folder name used under the platform config and cache directories.
const APP_DIR: &str = "travel-ticket-calendar";

/// Errors from loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid TOML or has wrongly typed values
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Unit of a configured duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl DurationUnit {
    fn seconds(self) -> f64 {
        match self {
            DurationUnit::Milliseconds => 0.001,
            DurationUnit::Seconds => 1.0,
            DurationUnit::Minutes => 60.0,
            DurationUnit::Hours => 3600.0,
            DurationUnit::Days => 86_400.0,
            DurationUnit::Weeks => 604_800.0,
        }
    }
}

/// A duration as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationSpec {
    pub magnitude: f64,
    pub unit: DurationUnit,
}

impl DurationSpec {
    pub const fn new(magnitude: f64, unit: DurationUnit) -> Self {
        Self { magnitude, unit }
    }

    /// Convert to a `Duration`. Negative or non-finite magnitudes become zero.
    pub fn to_duration(self) -> Duration {
        let secs = self.magnitude * self.unit.seconds();
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }
}

/// How calendar reminders are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Popup,
    Email,
}

impl ReminderMethod {
    /// Value of the calendar API's `method` field.
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderMethod::Popup => "popup",
            ReminderMethod::Email => "email",
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth client secrets for the calendar and storage APIs.
    pub google_credentials_path: PathBuf,
    /// Token store written after every successful sign-in or refresh.
    pub google_token_path: PathBuf,
    /// HTTP headers for the schedule API, as a JSON object.
    pub schedule_credentials_path: PathBuf,
    /// `{ "api_key": ... }` for the generative model.
    pub model_credentials_path: PathBuf,
    /// Daily log files go here when set; otherwise logs go to stderr.
    pub log_folder: Option<PathBuf>,

    pub cache_folder: PathBuf,
    /// Watched folder for incoming tickets.
    pub ticket_folder: PathBuf,
    /// Processed tickets are moved here when set.
    pub done_folder: Option<PathBuf>,

    pub calendar_id: String,
    pub reminder_method: ReminderMethod,
    /// Reminder offsets before departure.
    pub reminders: Vec<DurationSpec>,
    /// Colour for events whose traveller is not listed in `travelers`.
    pub event_color: EventColor,
    pub travelers: Vec<TravelerColor>,

    /// TTL of cache entries.
    pub cache_refresh_time: DurationSpec,
    /// Attempts per remote call before giving up.
    pub max_network_attempts: u32,
    /// Delay after the first failed attempt; doubles per retry.
    pub backoff_unit: DurationSpec,

    pub file_transfer_timeout: DurationSpec,
    pub file_transfer_poll_interval: DurationSpec,

    /// Per-request timeout for the schedule API.
    pub schedule_request_timeout: DurationSpec,
    /// How long to wait for the browser sign-in to complete.
    pub sign_in_timeout: DurationSpec,

    /// Preferred generative model.
    pub ai_model: String,
    /// Models rotated to when the preferred one is out of quota.
    pub ai_fallback_models: Vec<String>,

    /// Surface per-ticket failures as user notifications.
    pub notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let config_folder = default_config_folder();
        let cache_folder = dirs::cache_dir()
            .unwrap_or_else(|| home.join(".cache"))
            .join(APP_DIR);

        Self {
            google_credentials_path: config_folder.join("google_credentials.json"),
            google_token_path: config_folder.join("google_token.json"),
            schedule_credentials_path: config_folder.join("schedule_credentials.json"),
            model_credentials_path: config_folder.join("model_credentials.json"),
            log_folder: None,
            cache_folder,
            ticket_folder: home.join("travels"),
            done_folder: None,
            calendar_id: "primary".to_string(),
            reminder_method: ReminderMethod::Popup,
            reminders: vec![
                DurationSpec::new(30.0, DurationUnit::Minutes),
                DurationSpec::new(2.0, DurationUnit::Hours),
                DurationSpec::new(1.0, DurationUnit::Weeks),
            ],
            event_color: EventColor::Banana,
            travelers: Vec::new(),
            cache_refresh_time: DurationSpec::new(1.0, DurationUnit::Weeks),
            max_network_attempts: 7,
            backoff_unit: DurationSpec::new(1.0, DurationUnit::Seconds),
            file_transfer_timeout: DurationSpec::new(10.0, DurationUnit::Seconds),
            file_transfer_poll_interval: DurationSpec::new(250.0, DurationUnit::Milliseconds),
            schedule_request_timeout: DurationSpec::new(30.0, DurationUnit::Seconds),
            sign_in_timeout: DurationSpec::new(5.0, DurationUnit::Minutes),
            ai_model: "gemini-2.5-flash-lite".to_string(),
            ai_fallback_models: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.0-flash".to_string(),
            ],
            notifications: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        default_config_folder().join("config.toml")
    }

    /// Retry policy for all remote calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_network_attempts, self.backoff_unit.to_duration())
    }

    /// Cache settings.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(&self.cache_folder).with_ttl(self.cache_refresh_time.to_duration())
    }

    /// Traveller colour mapping with the configured default.
    pub fn traveler_colors(&self) -> TravelerColors {
        TravelerColors::new(self.travelers.clone(), self.event_color)
    }

    /// Reminder offsets as durations.
    pub fn reminder_offsets(&self) -> Vec<Duration> {
        self.reminders.iter().map(|r| r.to_duration()).collect()
    }

    /// Candidate models, preferred first, without duplicates.
    pub fn model_candidates(&self) -> Vec<String> {
        let mut models = vec![self.ai_model.clone()];
        for model in &self.ai_fallback_models {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }
}

fn default_config_folder() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
