//! Client configuration.
//!
//! Loaded from TOML by the native shell (or built in code). Every field has a
//! default, so an empty document is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// What an expired session leaves behind in storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiredCleanup {
    /// Delete token and timestamp; keep role and profile for the
    /// returning-user greeting
    #[default]
    Credentials,
    /// Delete every session key
    Everything,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, without the `/v1.0` prefix
    pub base_url: String,
    /// SQLite file for the secure store; in-memory when unset
    pub database_path: Option<PathBuf>,
    /// Per-request timeout; the transport default (none) when unset
    pub request_timeout_secs: Option<u64>,
    /// Days a login stays valid
    pub session_ttl_days: u32,
    pub expired_cleanup: ExpiredCleanup,
    /// Offset used to interpret entered dates/times and to display them
    pub utc_offset_minutes: i32,
    /// `tracing` filter directive installed by `open_client` (`RUST_LOG` wins)
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7227".into(),
            database_path: None,
            request_timeout_secs: None,
            session_ttl_days: 7,
            expired_cleanup: ExpiredCleanup::default(),
            utc_offset_minutes: 0,
            log_filter: "info".into(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: ClientConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.session_ttl_days == 0 {
            return Err(ConfigError::Invalid("session_ttl_days must be at least 1".into()));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        if offset_from_minutes(self.utc_offset_minutes).is_none() {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.session_ttl_days))
    }

    /// The configured offset, or UTC if it is out of range.
    pub fn utc_offset(&self) -> FixedOffset {
        offset_from_minutes(self.utc_offset_minutes).unwrap_or_else(utc)
    }
}

pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}
