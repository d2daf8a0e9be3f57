//! Runtime settings loaded via OrthoConfig.
//!
//! Values come from `TASKBOARD_*` environment variables, command-line flags
//! or a config file. Accessors apply defaults and report missing required
//! values as [`SettingsError`].

use std::str::FromStr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_FILTER: &str = "info";

/// Problems with the loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// A required value was not supplied.
    #[error("missing required setting `{key}` (set TASKBOARD_{env})")]
    Missing { key: &'static str, env: &'static str },
    /// The backend URL did not parse.
    #[error("backend_url `{value}` is not a valid URL: {reason}")]
    InvalidBackendUrl { value: String, reason: String },
    /// The log format was neither `json` nor `compact`.
    #[error("log_format must be `json` or `compact`, got `{0}`")]
    InvalidLogFormat(String),
    /// A zero timeout would fail every request.
    #[error("request_timeout_secs must be greater than zero")]
    ZeroTimeout,
}

/// Formatter used for diagnostics on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable single-line events.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(SettingsError::InvalidLogFormat(value.to_owned())),
        }
    }
}

/// Settings for the `taskboard` binary.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TASKBOARD")]
pub struct TaskboardSettings {
    /// Base URL of the hosted backend, e.g. `https://project.example.co`.
    pub backend_url: Option<String>,
    /// Public anonymous key sent as the `apikey` header.
    pub anon_key: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// `json` or `compact`.
    pub log_format: Option<String>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl TaskboardSettings {
    /// Parsed backend URL.
    pub fn backend_url(&self) -> Result<Url, SettingsError> {
        let raw = required(self.backend_url.as_deref(), "backend_url", "BACKEND_URL")?;
        Url::parse(raw).map_err(|err| SettingsError::InvalidBackendUrl {
            value: raw.to_owned(),
            reason: err.to_string(),
        })
    }

    pub fn anon_key(&self) -> Result<&str, SettingsError> {
        required(self.anon_key.as_deref(), "anon_key", "ANON_KEY")
    }

    pub fn request_timeout(&self) -> Result<Duration, SettingsError> {
        match self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => Err(SettingsError::ZeroTimeout),
            secs => Ok(Duration::from_secs(secs)),
        }
    }

    pub fn log_format(&self) -> Result<LogFormat, SettingsError> {
        self.log_format
            .as_deref()
            .map_or(Ok(LogFormat::default()), str::parse)
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

fn required<'a>(
    value: Option<&'a str>,
    key: &'static str,
    env: &'static str,
) -> Result<&'a str, SettingsError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SettingsError::Missing { key, env })
}
