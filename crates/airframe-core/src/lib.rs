#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod settings;
pub mod task;

// Re-export commonly used types for convenience
pub use domain::{
    BackendKind, Capacity, EndpointDescriptor, ErrorCategory, GatewayError, HealthState,
    HealthStatus, InferenceRequest, InferenceStreamEvent, Message, MessageRole,
    ParseBackendKindError, StreamEventKind, ToolCallDelta, ToolSpec, Usage,
};
pub use ports::{
    BackendAdapter, ConfigSource, ConfigSourceError, EndpointRegistry, HealthProbePort,
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, InferenceStream, LineStream,
    SnapshotCallback, StreamingResponse, TransportError,
};
pub use settings::{GatewaySettings, SettingsError, validate_settings};
pub use task::TaskHandle;
