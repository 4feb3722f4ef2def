//! Runtime settings for the reconciler.
//!
//! Settings come from an optional YAML file, then `HALLDYLL_*` environment
//! variables override individual keys. Every section has working defaults,
//! so an empty document is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Default control-plane endpoint.
pub const DEFAULT_API_URL: &str = "https://api.halldyll.com/v1";

/// Top-level reconciler settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Control-plane connection.
    #[serde(default)]
    pub api: ApiSettings,
    /// Deletion confirmation polling.
    #[serde(default)]
    pub poller: PollerSettings,
    /// Query the GPU catalogue before creating.
    #[serde(default)]
    pub check_gpu_availability: bool,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Control-plane connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiSettings {
    /// Base URL.
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Attempts for rate-limited or network-failed requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear backoff step in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Deletion poller timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollerSettings {
    /// Seconds between confirmation reads.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Seconds before giving up.
    #[serde(default = "default_poll_deadline")]
    pub deadline_secs: u64,
    /// Server-side timeout hint sent with the delete request.
    #[serde(default = "default_delete_timeout_hint")]
    pub delete_timeout_hint_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `halldyll_deploy_sync=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_api_url() -> String {
    String::from(DEFAULT_API_URL)
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_poll_interval() -> u64 {
    10
}

const fn default_poll_deadline() -> u64 {
    300
}

const fn default_delete_timeout_hint() -> u64 {
    5
}

fn default_log_level() -> String {
    String::from("info")
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            deadline_secs: default_poll_deadline(),
            delete_timeout_hint_secs: default_delete_timeout_hint(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl PollerSettings {
    /// Interval between polls.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Total wait budget.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Server-side delete timeout hint.
    #[must_use]
    pub const fn delete_timeout_hint(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_hint_secs)
    }
}

impl ReconcilerSettings {
    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unusable URL or poll timing.
    pub fn validate(&self) -> Result<()> {
        if !(self.api.url.starts_with("http://") || self.api.url.starts_with("https://")) {
            return Err(ConfigError::validation(
                format!("API URL must be http(s): {}", self.api.url),
                "api.url",
            )
            .into());
        }
        if self.poller.interval_secs == 0 {
            return Err(
                ConfigError::validation("Poll interval must be positive", "poller.interval_secs")
                    .into(),
            );
        }
        if self.poller.deadline_secs < self.poller.interval_secs {
            return Err(ConfigError::validation(
                "Poll deadline must be at least one interval",
                "poller.deadline_secs",
            )
            .into());
        }
        Ok(())
    }
}
