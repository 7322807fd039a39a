//! Configuration structures
//!
//! Plain serde structs so they can be loaded from TOML/JSON files or built in
//! code. Durations are stored as integer seconds/milliseconds to keep the file
//! format readable.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MAX_TRANSIENT_FAILURES,
    DEFAULT_MAX_UNKNOWN_CHECKS, DEFAULT_MAX_WAIT_SECS, DEFAULT_POLL_BACKOFF_FACTOR,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS,
};
use crate::errors::{Result, WbError};
use crate::types::{BucketLimits, Category};

/// Top-level client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing)]
    pub token: String,
    #[serde(default)]
    pub sandbox: bool,
    /// Send every category to this origin instead of the platform hosts.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("sandbox", &self.sandbox)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("rate_limits", &self.rate_limits)
            .field("polling", &self.polling)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            sandbox: false,
            base_url: None,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            rate_limits: RateLimitConfig::default(),
            polling: PollingConfig::default(),
        }
    }

    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject configurations that cannot work.
    ///
    /// # Errors
    /// Returns `WbError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(WbError::Config("token cannot be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(WbError::Config("timeout must be positive".into()));
        }
        self.rate_limits.validate()?;
        self.polling.validate()
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Backoff applied after a 429 that carried no retry hint.
    #[serde(default = "default_backoff_ms")]
    pub default_backoff_ms: u64,
    /// Deadline used by `acquire` when the caller passes none.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Per-category quota overrides; unlisted categories use built-ins.
    #[serde(default)]
    pub overrides: HashMap<Category, BucketLimits>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_backoff_ms: default_backoff_ms(),
            max_wait_ms: default_max_wait_ms(),
            overrides: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn limits_for(&self, category: Category) -> BucketLimits {
        self.overrides.get(&category).copied().unwrap_or_else(|| category.default_limits())
    }

    pub fn with_limits(mut self, category: Category, limits: BucketLimits) -> Self {
        self.overrides.insert(category, limits);
        self
    }

    pub fn default_backoff(&self) -> Duration {
        Duration::from_millis(self.default_backoff_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// # Errors
    /// Returns `WbError::Config` when an override has a zero rate or burst.
    pub fn validate(&self) -> Result<()> {
        for (category, limits) in &self.overrides {
            if limits.burst == 0 {
                return Err(WbError::Config(format!("burst for {category} must be greater than 0")));
            }
            if limits.requests_per_minute == 0 {
                return Err(WbError::Config(format!(
                    "requests_per_minute for {category} must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

/// When the progress callback fires.
///
/// `EveryCheck` is the default and hands the callback a snapshot after each
/// successful check, changed or not. `OnChange` restricts it to checks where
/// the status or the progress counters moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressNotify {
    /// After every successful status check.
    #[default]
    EveryCheck,
    /// Only when status or progress counters changed.
    OnChange,
}

/// Task polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,
    /// Multiplier applied to the interval after every non-terminal check.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_poll_max_interval_secs")]
    pub max_interval_secs: u64,
    #[serde(default = "default_max_transient_failures")]
    pub max_transient_failures: u32,
    #[serde(default = "default_max_unknown_checks")]
    pub max_unknown_checks: u32,
    #[serde(default)]
    pub notify: ProgressNotify,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            timeout_secs: default_poll_timeout_secs(),
            backoff_factor: default_backoff_factor(),
            max_interval_secs: default_poll_max_interval_secs(),
            max_transient_failures: default_max_transient_failures(),
            max_unknown_checks: default_max_unknown_checks(),
            notify: ProgressNotify::default(),
        }
    }
}

impl PollingConfig {
    /// # Errors
    /// Returns `WbError::Config` for a zero timeout, zero failure budget or a
    /// shrinking backoff factor.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(WbError::Config("polling timeout must be positive".into()));
        }
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            return Err(WbError::Config("polling backoff_factor must be >= 1.0".into()));
        }
        if self.max_transient_failures == 0 {
            return Err(WbError::Config("max_transient_failures must be greater than 0".into()));
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_SECS * 1_000
}

fn default_max_wait_ms() -> u64 {
    DEFAULT_MAX_WAIT_SECS * 1_000
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS * 1_000
}

fn default_poll_timeout_secs() -> u64 {
    DEFAULT_POLL_TIMEOUT_SECS
}

fn default_backoff_factor() -> f64 {
    DEFAULT_POLL_BACKOFF_FACTOR
}

fn default_poll_max_interval_secs() -> u64 {
    DEFAULT_POLL_MAX_INTERVAL_SECS
}

fn default_max_transient_failures() -> u32 {
    DEFAULT_MAX_TRANSIENT_FAILURES
}

fn default_max_unknown_checks() -> u32 {
    DEFAULT_MAX_UNKNOWN_CHECKS
}
