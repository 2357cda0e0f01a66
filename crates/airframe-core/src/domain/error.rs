//! Categorized gateway errors.
//!
//! A [`GatewayError`] is carried inside an error stream event. It is a value,
//! not a control-flow error: adapters never return it across their boundary.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed failure taxonomy carried on every user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Transport deadline exceeded.
    Timeout,
    /// Could not establish or maintain the transport.
    Connection,
    /// The backend answered with an error, or an uncategorized local failure.
    Backend,
    /// A received payload could not be decoded.
    Parse,
    /// No adapter for the backend kind, or a failure with no specific cause.
    Unknown,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Backend => "backend",
            Self::Parse => "parse",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized failure with optional raw backend payload for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{category} error: {message}")]
pub struct GatewayError {
    pub category: ErrorCategory,
    pub message: String,
    /// Raw HTTP body or payload that caused the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_backend: Option<String>,
}

impl GatewayError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            raw_backend: None,
        }
    }

    /// Attach the raw backend payload.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw_backend = Some(raw.into());
        self
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Connection, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Backend, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Parse, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }
}
