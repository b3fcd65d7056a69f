//! Client configuration.
//!
//! Everything comes from the environment (a `.env` file is honored via
//! dotenvy in `main`), with CLI flags layered on top by the binary. Only
//! the relay URL is required; the assistant simply runs offline without a
//! Gemini key.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default long-poll window the relay is asked to hold.
pub const DEFAULT_POLL_WAIT_SECS: u64 = 25;

/// Default SQLite history file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "trc_history.db";

/// Default Gemini model for the assistant.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Channel joined at startup.
pub const DEFAULT_CHANNEL: &str = "general";

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub relay_url: String,
    pub relay_token: Option<String>,
    pub poll_wait: Duration,
    pub db_path: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub default_channel: String,
}

impl Config {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary lookup (testable without touching the
    /// process environment).
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let relay_url = get("TRC_RELAY_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "TRC_RELAY_URL".to_string(),
                hint: "Set TRC_RELAY_URL to your relay's base URL (e.g. in .env)".to_string(),
            })?;

        let poll_wait_secs = match get("TRC_POLL_WAIT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "TRC_POLL_WAIT_SECS".to_string(),
                message: format!("'{raw}' is not a number of seconds"),
            })?,
            None => DEFAULT_POLL_WAIT_SECS,
        };

        Ok(Self {
            relay_url: relay_url.trim_end_matches('/').to_string(),
            relay_token: get("TRC_RELAY_TOKEN").filter(|v| !v.is_empty()),
            poll_wait: Duration::from_secs(poll_wait_secs),
            db_path: PathBuf::from(
                get("TRC_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            ),
            gemini_api_key: get("GEMINI_API_KEY").filter(|v| !v.is_empty()),
            gemini_model: get("TRC_GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            default_channel: get("TRC_DEFAULT_CHANNEL")
                .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
        })
    }
}
