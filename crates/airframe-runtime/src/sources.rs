//! [`ConfigSource`] implementations.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use airframe_core::{ConfigSource, ConfigSourceError};
use async_trait::async_trait;
use tracing::debug;

/// A Kubernetes ConfigMap mounted as a volume: each key is a file in `dir`.
#[derive(Debug, Clone)]
pub struct MountedConfigMapSource {
    dir: PathBuf,
}

impl MountedConfigMapSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// ConfigMap keys are limited to `[-._a-zA-Z0-9]`; anything else could
/// escape the mount directory.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl ConfigSource for MountedConfigMapSource {
    async fn read(&self, key: &str) -> Result<Option<String>, ConfigSourceError> {
        if !is_valid_key(key) {
            return Err(ConfigSourceError::InvalidKey(key.to_string()));
        }
        let path = self.dir.join(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| {
                ConfigSourceError::InvalidEncoding {
                    key: key.to_string(),
                }
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config key not present");
                Ok(None)
            }
            Err(e) => Err(ConfigSourceError::Unavailable(format!(
                "{}: {e}",
                path.display()
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("configmap mount {}", self.dir.display())
    }
}

/// In-process key-value store.
#[derive(Debug, Default)]
pub struct InMemoryConfigSource {
    values: RwLock<HashMap<String, String>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Make every read fail with `reason` until cleared with `None`.
    pub fn set_failure(&self, reason: Option<String>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = reason;
    }
}

#[async_trait]
impl ConfigSource for InMemoryConfigSource {
    async fn read(&self, key: &str) -> Result<Option<String>, ConfigSourceError> {
        if let Some(reason) = self
            .failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(ConfigSourceError::Unavailable(reason));
        }
        Ok(self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn describe(&self) -> String {
        "in-memory config".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mounted_source_reads_key_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("endpoints.json"), "[]").unwrap();
        let source = MountedConfigMapSource::new(dir.path());

        assert_eq!(
            source.read("endpoints.json").await.unwrap().as_deref(),
            Some("[]")
        );
        assert_eq!(source.read("missing.json").await.unwrap(), None);
        assert!(source.describe().contains("configmap mount"));
    }

    #[tokio::test]
    async fn test_mounted_source_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let source = MountedConfigMapSource::new(dir.path());
        assert!(matches!(
            source.read("../etc/passwd").await,
            Err(ConfigSourceError::InvalidKey(_))
        ));
        assert!(matches!(
            source.read("..").await,
            Err(ConfigSourceError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_mounted_source_rejects_binary() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blob"), [0xff, 0xfe, 0x00]).unwrap();
        let source = MountedConfigMapSource::new(dir.path());
        assert_eq!(
            source.read("blob").await,
            Err(ConfigSourceError::InvalidEncoding {
                key: "blob".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_in_memory_source() {
        let source = InMemoryConfigSource::new().with_value("k", "v");
        assert_eq!(source.read("k").await.unwrap().as_deref(), Some("v"));

        source.set_failure(Some("api server down".to_string()));
        assert!(matches!(
            source.read("k").await,
            Err(ConfigSourceError::Unavailable(_))
        ));

        source.set_failure(None);
        source.remove("k");
        assert_eq!(source.read("k").await.unwrap(), None);
    }
}
