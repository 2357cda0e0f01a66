//! Endpoint registries.
//!
//! - [`StaticRegistry`]: fixed endpoint list handed in at construction
//! - [`DynamicRegistry`]: endpoint list polled from a [`ConfigSource`]
//!
//! Both keep a health table fed by an optional [`HealthProbePort`] and
//! implement the [`EndpointRegistry`] port.
//!
//! [`ConfigSource`]: airframe_core::ConfigSource
//! [`HealthProbePort`]: airframe_core::HealthProbePort
//! [`EndpointRegistry`]: airframe_core::EndpointRegistry

mod dynamic;
mod health_table;
pub mod schema;
mod static_registry;

use thiserror::Error;

pub use dynamic::{DynamicRegistry, DynamicRegistryConfig, PollOutcome};
pub use schema::{SchemaError, parse_endpoint_document};
pub use static_registry::StaticRegistry;

/// Registry construction and configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate endpoint name '{0}'")]
    DuplicateEndpoint(String),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("config key must not be empty")]
    EmptyKey,
}
