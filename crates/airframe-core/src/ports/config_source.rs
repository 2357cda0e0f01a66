//! External key-value configuration source port.
//!
//! The dynamic registry polls one key of such a source (e.g. a Kubernetes
//! ConfigMap) for its endpoint document.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reading from a configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigSourceError {
    /// The source could not be reached or read.
    #[error("config source unavailable: {0}")]
    Unavailable(String),

    /// The key cannot name a value in this source.
    #[error("invalid config key '{0}'")]
    InvalidKey(String),

    /// The stored value is not valid UTF-8 text.
    #[error("config value for '{key}' is not valid UTF-8")]
    InvalidEncoding { key: String },
}

/// Port for reading string values by key.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is missing.
    async fn read(&self, key: &str) -> Result<Option<String>, ConfigSourceError>;

    /// Short human-readable description for logs (e.g. a directory path).
    fn describe(&self) -> String;
}
