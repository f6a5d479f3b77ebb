//! Refresh timing configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use env_config::RefreshSettings;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_STALE_DATA_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("refresh interval must be greater than zero")]
    ZeroInterval,
    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,
    #[error("load settings: {0}")]
    Load(#[from] env_config::LoadError),
}

/// How often routes are refreshed and how long failed data may be shown.
///
/// Durations (de)serialize as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteRefreshOptions {
    #[serde(rename = "interval_ms", with = "duration_ms")]
    interval: Duration,
    max_retries: u32,
    #[serde(rename = "stale_data_timeout_ms", with = "duration_ms")]
    stale_data_timeout: Duration,
    #[serde(rename = "request_timeout_ms", with = "option_duration_ms")]
    request_timeout: Option<Duration>,
}

impl Default for RouteRefreshOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            stale_data_timeout: DEFAULT_STALE_DATA_TIMEOUT,
            request_timeout: None,
        }
    }
}

impl RouteRefreshOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_stale_data_timeout(mut self, timeout: Duration) -> Self {
        self.stale_data_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Wait between the end of one planned cycle and the next attempt.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Silent retries after a failed planned attempt before the failure is reported.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// How long after the last success failed attempts go unnoticed by observers.
    pub fn stale_data_timeout(&self) -> Duration {
        self.stale_data_timeout
    }

    /// Per-route request timeout; the interval unless set.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout.unwrap_or(self.interval)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.interval.is_zero() {
            return Err(OptionsError::ZeroInterval);
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(OptionsError::ZeroRequestTimeout);
        }
        Ok(())
    }

    /// Defaults overlaid with whatever `settings` sets, then validated.
    pub fn from_settings(settings: &RefreshSettings) -> Result<Self, OptionsError> {
        let mut options = Self::default();
        if let Some(ms) = settings.interval_ms {
            options.interval = Duration::from_millis(ms);
        }
        if let Some(max_retries) = settings.max_retries {
            options.max_retries = max_retries;
        }
        if let Some(ms) = settings.stale_data_timeout_ms {
            options.stale_data_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = settings.request_timeout_ms {
            options.request_timeout = Some(Duration::from_millis(ms));
        }
        options.validate()?;
        Ok(options)
    }

    /// Loads XDG config, `.env` and environment for `app_name` (see the `config` crate).
    pub fn load(app_name: &str, override_dir: Option<&Path>) -> Result<Self, OptionsError> {
        let settings = env_config::load_settings(app_name, override_dir)?;
        Self::from_settings(&settings)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
