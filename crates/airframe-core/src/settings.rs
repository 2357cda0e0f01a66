//! Gateway settings and validation.
//!
//! All fields are optional so partial sources (environment, CLI flags) can be
//! layered; `effective_*` getters apply the defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-probe timeout in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Default per-request timeout for inference calls in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default transport connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of attempts for a retried exchange.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay of the exponential backoff in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Default interval between health monitor cycles in seconds.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

/// Default interval between dynamic registry polls in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Prefix of every environment variable read by [`GatewaySettings::from_env`].
pub const ENV_PREFIX: &str = "AIRFRAME_";

/// Gateway settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Timeout of a single health probe.
    pub probe_timeout_ms: Option<u64>,

    /// Per-call timeout of inference requests.
    pub request_timeout_secs: Option<u64>,

    /// Transport-level connect timeout.
    pub connect_timeout_secs: Option<u64>,

    /// Attempts per exchange, including the first one.
    pub max_attempts: Option<u32>,

    /// Base delay of the exponential backoff between attempts.
    pub retry_base_delay_ms: Option<u64>,

    /// Interval between health monitor cycles.
    pub health_check_interval_secs: Option<u64>,

    /// Interval between dynamic registry polls.
    pub poll_interval_secs: Option<u64>,

    /// Accept YAML endpoint documents when JSON parsing fails.
    pub yaml_fallback: Option<bool>,
}

impl GatewaySettings {
    /// Create settings with every field set to its default.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            probe_timeout_ms: Some(DEFAULT_PROBE_TIMEOUT_MS),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: Some(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            retry_base_delay_ms: Some(DEFAULT_RETRY_BASE_DELAY_MS),
            health_check_interval_secs: Some(DEFAULT_HEALTH_CHECK_INTERVAL_SECS),
            poll_interval_secs: Some(DEFAULT_POLL_INTERVAL_SECS),
            yaml_fallback: Some(true),
        }
    }

    /// Load settings from `AIRFRAME_*` environment variables.
    ///
    /// Unset variables leave the field `None`.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            probe_timeout_ms: parse_var(&lookup, "PROBE_TIMEOUT_MS")?,
            request_timeout_secs: parse_var(&lookup, "REQUEST_TIMEOUT_SECS")?,
            connect_timeout_secs: parse_var(&lookup, "CONNECT_TIMEOUT_SECS")?,
            max_attempts: parse_var(&lookup, "MAX_ATTEMPTS")?,
            retry_base_delay_ms: parse_var(&lookup, "RETRY_BASE_DELAY_MS")?,
            health_check_interval_secs: parse_var(&lookup, "HEALTH_CHECK_INTERVAL_SECS")?,
            poll_interval_secs: parse_var(&lookup, "POLL_INTERVAL_SECS")?,
            yaml_fallback: parse_var(&lookup, "YAML_FALLBACK")?,
        })
    }

    /// Overlay `other` onto `self`, only updating fields that are `Some`.
    pub fn merge(&mut self, other: &Self) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        overlay!(
            probe_timeout_ms,
            request_timeout_secs,
            connect_timeout_secs,
            max_attempts,
            retry_base_delay_ms,
            health_check_interval_secs,
            poll_interval_secs,
            yaml_fallback,
        );
    }

    #[must_use]
    pub const fn effective_probe_timeout(&self) -> Duration {
        Duration::from_millis(match self.probe_timeout_ms {
            Some(ms) => ms,
            None => DEFAULT_PROBE_TIMEOUT_MS,
        })
    }

    #[must_use]
    pub const fn effective_request_timeout(&self) -> Duration {
        Duration::from_secs(match self.request_timeout_secs {
            Some(secs) => secs,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        })
    }

    #[must_use]
    pub const fn effective_connect_timeout(&self) -> Duration {
        Duration::from_secs(match self.connect_timeout_secs {
            Some(secs) => secs,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        })
    }

    #[must_use]
    pub const fn effective_max_attempts(&self) -> u32 {
        match self.max_attempts {
            Some(n) => n,
            None => DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub const fn effective_retry_base_delay(&self) -> Duration {
        Duration::from_millis(match self.retry_base_delay_ms {
            Some(ms) => ms,
            None => DEFAULT_RETRY_BASE_DELAY_MS,
        })
    }

    #[must_use]
    pub const fn effective_health_check_interval(&self) -> Duration {
        Duration::from_secs(match self.health_check_interval_secs {
            Some(secs) => secs,
            None => DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
        })
    }

    #[must_use]
    pub const fn effective_poll_interval(&self) -> Duration {
        Duration::from_secs(match self.poll_interval_secs {
            Some(secs) => secs,
            None => DEFAULT_POLL_INTERVAL_SECS,
        })
    }

    #[must_use]
    pub const fn effective_yaml_fallback(&self) -> bool {
        match self.yaml_fallback {
            Some(enabled) => enabled,
            None => true,
        }
    }
}

fn parse_var<F, T>(lookup: &F, suffix: &str) -> Result<Option<T>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let var = format!("{ENV_PREFIX}{suffix}");
    match lookup(&var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SettingsError::InvalidEnvValue { var, value: raw }),
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Max attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnvValue { var: String, value: String },
}

/// Validate settings values.
pub fn validate_settings(settings: &GatewaySettings) -> Result<(), SettingsError> {
    if let Some(attempts) = settings.max_attempts {
        if attempts == 0 {
            return Err(SettingsError::InvalidMaxAttempts(attempts));
        }
    }

    let durations = [
        ("probe_timeout_ms", settings.probe_timeout_ms),
        ("request_timeout_secs", settings.request_timeout_secs),
        ("connect_timeout_secs", settings.connect_timeout_secs),
        ("health_check_interval_secs", settings.health_check_interval_secs),
        ("poll_interval_secs", settings.poll_interval_secs),
    ];
    for (name, value) in durations {
        if value == Some(0) {
            return Err(SettingsError::ZeroDuration(name));
        }
    }

    Ok(())
}
