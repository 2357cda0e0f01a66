//! Backend adapters.
//!
//! Each adapter pairs a [`WireDialect`] with the shared retrying exchange.
//!
//! | Adapter | Backend kind | Route |
//! |---|---|---|
//! | [`LlamaCppAdapter`] | `llamacpp` | `/completion` or `/v1/completions` |
//! | [`OpenAiChatAdapter`] | `openai` | `/v1/chat/completions` |

pub mod decoder;
mod exchange;
pub mod llamacpp;
pub mod openai_chat;
pub mod retry;
pub mod sse;

use std::time::Duration;

use airframe_core::{GatewaySettings, validate_settings};
use thiserror::Error;

pub use decoder::{ChunkOutcome, StreamDecoder, WireDialect};
pub use llamacpp::{CompletionDialect, LlamaCppAdapter};
pub use openai_chat::{ChatDialect, OpenAiChatAdapter};
pub use retry::RetryPolicy;

/// Invalid adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterConfigError {
    #[error("retry policy needs at least one attempt")]
    ZeroAttempts,

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error(transparent)]
    Settings(#[from] airframe_core::SettingsError),
}

/// Settings shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterConfig {
    pub retry: RetryPolicy,
    /// Per-call deadline of each attempt.
    pub request_timeout: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: GatewaySettings::default().effective_request_timeout(),
        }
    }
}

impl AdapterConfig {
    pub fn new(retry: RetryPolicy, request_timeout: Duration) -> Result<Self, AdapterConfigError> {
        if request_timeout.is_zero() {
            return Err(AdapterConfigError::ZeroTimeout);
        }
        Ok(Self {
            retry,
            request_timeout,
        })
    }

    pub fn from_settings(settings: &GatewaySettings) -> Result<Self, AdapterConfigError> {
        validate_settings(settings)?;
        let retry = RetryPolicy::new(
            settings.effective_max_attempts(),
            settings.effective_retry_base_delay(),
        )?;
        Self::new(retry, settings.effective_request_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = GatewaySettings {
            max_attempts: Some(5),
            retry_base_delay_ms: Some(250),
            ..GatewaySettings::default()
        };
        let config = AdapterConfig::from_settings(&settings).unwrap();
        assert_eq!(config.retry.max_attempts(), 5);
        assert_eq!(config.retry.delay_for(1), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = GatewaySettings {
            max_attempts: Some(0),
            ..GatewaySettings::default()
        };
        assert!(matches!(
            AdapterConfig::from_settings(&settings),
            Err(AdapterConfigError::Settings(_))
        ));
        assert_eq!(
            AdapterConfig::new(RetryPolicy::default(), Duration::ZERO),
            Err(AdapterConfigError::ZeroTimeout)
        );
    }
}
