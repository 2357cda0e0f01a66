//! Bounded exponential backoff.

use std::time::Duration;

use airframe_core::GatewaySettings;

use super::AdapterConfigError;

/// Attempt limit plus doubling delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let settings = GatewaySettings::default();
        Self {
            max_attempts: settings.effective_max_attempts(),
            base_delay: settings.effective_retry_base_delay(),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt and must be at least 1.
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Result<Self, AdapterConfigError> {
        if max_attempts == 0 {
            return Err(AdapterConfigError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            base_delay,
        })
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay after the zero-based `attempt` failed: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Returns true if `attempt` (zero-based) is the last one allowed.
    pub const fn is_last(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) >= self.max_attempts
    }
}
