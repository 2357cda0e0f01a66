//! Endpoint descriptors.
//!
//! An endpoint is one LLM-serving backend reachable over HTTP. Descriptors
//! are owned by the registry that produced them; consumers receive clones.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire protocol family spoken by an endpoint.
///
/// The serialized names are the values accepted in endpoint documents and
/// are case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    /// Native llama.cpp completion server (`/completion`, `/health`).
    #[serde(rename = "llamacpp")]
    LlamaCpp,
    /// OpenAI-compatible API (`/v1/completions`, `/v1/chat/completions`).
    #[serde(rename = "openai")]
    OpenAiCompatible,
    /// Anthropic messages API (`/v1/messages`).
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl BackendKind {
    /// Every backend kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::LlamaCpp, Self::OpenAiCompatible, Self::Anthropic];

    /// The serialized name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LlamaCpp => "llamacpp",
            Self::OpenAiCompatible => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known backend kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backend kind '{0}' (expected one of: llamacpp, openai, anthropic)")]
pub struct ParseBackendKindError(pub String);

impl FromStr for BackendKind {
    type Err = ParseBackendKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseBackendKindError(s.to_string()))
    }
}

/// Advisory capacity hint. Not enforced anywhere in airframe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    /// Maximum concurrent requests the endpoint is expected to handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
    /// Hardware or pricing tier label (e.g. "gpu-a100", "cpu").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

/// A named LLM endpoint.
///
/// `name` is the registry key. Uniqueness within a snapshot is enforced by
/// the registry, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Unique key within one registry snapshot.
    pub name: String,
    /// Base URL, e.g. `http://10.0.0.4:8080`.
    pub base_url: String,
    /// Wire protocol family.
    pub backend_kind: BackendKind,
    /// Free-form dialect hint for adapters that speak several request shapes
    /// over the same protocol (e.g. "native" vs "openai").
    #[serde(rename = "api_type", default, skip_serializing_if = "Option::is_none")]
    pub api_dialect: Option<String>,
    /// Informational labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Advisory capacity hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Capacity>,
    /// Opaque passthrough metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl EndpointDescriptor {
    /// Create a descriptor with no dialect, tags, capacity or metadata.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        backend_kind: BackendKind,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            backend_kind,
            api_dialect: None,
            tags: BTreeMap::new(),
            capacity: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the dialect hint.
    #[must_use]
    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.api_dialect = Some(dialect.into());
        self
    }

    /// Add an informational tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the capacity hint.
    #[must_use]
    pub fn with_capacity(mut self, max_concurrency: Option<u32>, tier: Option<String>) -> Self {
        self.capacity = Some(Capacity {
            max_concurrency,
            tier,
        });
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Join `base_url` with an absolute path.
    ///
    /// Trailing slashes on the base are dropped so `http://h:1/` and
    /// `http://h:1` produce the same URL.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Returns true when the dialect hint names the given dialect
    /// (ASCII case-insensitive).
    #[must_use]
    pub fn dialect_is(&self, dialect: &str) -> bool {
        self.api_dialect
            .as_deref()
            .is_some_and(|d| d.trim().eq_ignore_ascii_case(dialect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_round_trips_through_str() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_backend_kind_parse_is_case_sensitive() {
        let err = "OpenAI".parse::<BackendKind>().unwrap_err();
        assert_eq!(err, ParseBackendKindError("OpenAI".to_string()));
        assert!(err.to_string().contains("llamacpp"));
    }

    #[test]
    fn test_url_for_trims_trailing_slash() {
        let ep = EndpointDescriptor::new("a", "http://localhost:8080/", BackendKind::LlamaCpp);
        assert_eq!(ep.url_for("/health"), "http://localhost:8080/health");
        assert_eq!(ep.url_for("completion"), "http://localhost:8080/completion");
    }

    #[test]
    fn test_dialect_is_ignores_case() {
        let ep = EndpointDescriptor::new("a", "http://h", BackendKind::LlamaCpp)
            .with_dialect("OpenAI");
        assert!(ep.dialect_is("openai"));
        assert!(!ep.dialect_is("native"));

        let plain = EndpointDescriptor::new("b", "http://h", BackendKind::LlamaCpp);
        assert!(!plain.dialect_is("openai"));
    }

    #[test]
    fn test_serialization_uses_api_type_and_skips_empty() {
        let ep = EndpointDescriptor::new("gpu-1", "http://h", BackendKind::OpenAiCompatible)
            .with_dialect("openai")
            .with_capacity(Some(4), Some("a100".to_string()));

        let json = serde_json::to_value(&ep).unwrap();
        assert_eq!(json["backend_kind"], "openai");
        assert_eq!(json["api_type"], "openai");
        assert_eq!(json["capacity"]["max_concurrency"], 4);
        assert!(json.get("tags").is_none());
        assert!(json.get("metadata").is_none());
    }
}
