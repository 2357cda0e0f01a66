//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the gateway expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP client types in any signature
//! - Probes and adapters never fail across the port: failures are values
//! - Optional collaborators are `Option<Arc<dyn Port>>` at the call site

pub mod backend_adapter;
pub mod config_source;
pub mod health_probe;
pub mod http_transport;
pub mod registry;

pub use backend_adapter::{BackendAdapter, InferenceStream};
pub use config_source::{ConfigSource, ConfigSourceError};
pub use health_probe::HealthProbePort;
pub use http_transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, LineStream, StreamingResponse,
    TransportError,
};
pub use registry::{EndpointRegistry, SnapshotCallback};
