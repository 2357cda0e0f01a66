//! Endpoint document parsing.
//!
//! A document is a JSON (or, with the YAML fallback enabled, YAML) list of
//! endpoint records:
//!
//! ```json
//! [
//!   {"name": "gpu-1", "base_url": "http://10.0.0.4:8080", "backend_kind": "llamacpp",
//!    "api_type": "native", "tags": {"zone": "a"},
//!    "capacity": {"max_concurrency": 4, "tier": "a100"}}
//! ]
//! ```
//!
//! Parsing is all-or-nothing: one bad record rejects the whole document.

use std::collections::HashSet;

use airframe_core::EndpointDescriptor;
use thiserror::Error;

/// Why an endpoint document was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("endpoint document is empty")]
    EmptyDocument,

    /// Syntax error, wrong shape, missing field or unknown `backend_kind`.
    /// `yaml` is set when the YAML fallback was tried as well.
    #[error("invalid endpoint document: {json}")]
    Invalid { json: String, yaml: Option<String> },

    #[error("endpoint #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("endpoint '{name}' has an empty base_url")]
    EmptyBaseUrl { name: String },

    #[error("duplicate endpoint name '{0}'")]
    DuplicateName(String),
}

/// Parse and validate an endpoint document.
pub fn parse_endpoint_document(
    raw: &str,
    yaml_fallback: bool,
) -> Result<Vec<EndpointDescriptor>, SchemaError> {
    if raw.trim().is_empty() {
        return Err(SchemaError::EmptyDocument);
    }

    let endpoints = match serde_json::from_str::<Vec<EndpointDescriptor>>(raw) {
        Ok(endpoints) => endpoints,
        Err(json_err) if yaml_fallback => serde_yaml::from_str::<Vec<EndpointDescriptor>>(raw)
            .map_err(|yaml_err| SchemaError::Invalid {
                json: json_err.to_string(),
                yaml: Some(yaml_err.to_string()),
            })?,
        Err(json_err) => {
            return Err(SchemaError::Invalid {
                json: json_err.to_string(),
                yaml: None,
            });
        }
    };

    validate_endpoints(&endpoints)?;
    Ok(endpoints)
}

/// Check the snapshot invariants: non-empty names and URLs, unique names.
pub fn validate_endpoints(endpoints: &[EndpointDescriptor]) -> Result<(), SchemaError> {
    for (index, endpoint) in endpoints.iter().enumerate() {
        if endpoint.name.trim().is_empty() {
            return Err(SchemaError::EmptyName { index });
        }
        if endpoint.base_url.trim().is_empty() {
            return Err(SchemaError::EmptyBaseUrl {
                name: endpoint.name.clone(),
            });
        }
    }
    match find_duplicate(endpoints) {
        Some(name) => Err(SchemaError::DuplicateName(name.to_string())),
        None => Ok(()),
    }
}

/// First name that appears more than once.
pub fn find_duplicate(endpoints: &[EndpointDescriptor]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(endpoints.len());
    endpoints
        .iter()
        .map(|e| e.name.as_str())
        .find(|name| !seen.insert(*name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use airframe_core::BackendKind;

    #[test]
    fn test_parse_full_record() {
        let raw = r#"[
            {"name": "gpu-1", "base_url": "http://10.0.0.4:8080", "backend_kind": "llamacpp",
             "api_type": "openai", "tags": {"zone": "a"},
             "capacity": {"max_concurrency": 4, "tier": "a100"},
             "metadata": {"owner": "ml"}},
            {"name": "cloud", "base_url": "https://api.example.com", "backend_kind": "openai"}
        ]"#;
        let endpoints = parse_endpoint_document(raw, false).unwrap();
        assert_eq!(endpoints.len(), 2);
        let gpu = &endpoints[0];
        assert_eq!(gpu.backend_kind, BackendKind::LlamaCpp);
        assert!(gpu.dialect_is("openai"));
        assert_eq!(gpu.tags["zone"], "a");
        assert_eq!(gpu.capacity.as_ref().unwrap().max_concurrency, Some(4));
        assert_eq!(gpu.metadata["owner"], "ml");
        assert_eq!(endpoints[1].backend_kind, BackendKind::OpenAiCompatible);
    }

    #[test]
    fn test_empty_list_is_valid() {
        assert!(parse_endpoint_document("[]", false).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_backend_kind_rejects_document() {
        let raw = r#"[
            {"name": "a", "base_url": "http://a", "backend_kind": "llamacpp"},
            {"name": "b", "base_url": "http://b", "backend_kind": "LlamaCpp"}
        ]"#;
        assert!(matches!(
            parse_endpoint_document(raw, false),
            Err(SchemaError::Invalid { .. })
        ));
    }

    #[test]
    fn test_missing_field_rejects_document() {
        let raw = r#"[{"name": "a", "backend_kind": "openai"}]"#;
        let err = parse_endpoint_document(raw, false).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_yaml_fallback() {
        let raw = "- name: a\n  base_url: http://a\n  backend_kind: anthropic\n";
        assert!(parse_endpoint_document(raw, false).is_err());
        let endpoints = parse_endpoint_document(raw, true).unwrap();
        assert_eq!(endpoints[0].backend_kind, BackendKind::Anthropic);
    }

    #[test]
    fn test_invariant_violations() {
        let dup = r#"[
            {"name": "a", "base_url": "http://a", "backend_kind": "openai"},
            {"name": "a", "base_url": "http://b", "backend_kind": "openai"}
        ]"#;
        assert_eq!(
            parse_endpoint_document(dup, false),
            Err(SchemaError::DuplicateName("a".to_string()))
        );

        let no_name = r#"[{"name": " ", "base_url": "http://a", "backend_kind": "openai"}]"#;
        assert_eq!(
            parse_endpoint_document(no_name, false),
            Err(SchemaError::EmptyName { index: 0 })
        );

        let no_url = r#"[{"name": "a", "base_url": "", "backend_kind": "openai"}]"#;
        assert!(matches!(
            parse_endpoint_document(no_url, false),
            Err(SchemaError::EmptyBaseUrl { .. })
        ));

        assert_eq!(
            parse_endpoint_document("  \n", true),
            Err(SchemaError::EmptyDocument)
        );
    }
}
