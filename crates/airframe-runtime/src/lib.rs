#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by the integration tests
#[cfg(test)]
use airframe_runtime as _;
#[cfg(test)]
use tokio_test as _;

pub mod adapters;
pub mod gateway;
pub mod probe;
pub mod registry;
pub mod sources;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod transport;

pub use adapters::{
    AdapterConfig, AdapterConfigError, ChatDialect, CompletionDialect, LlamaCppAdapter,
    OpenAiChatAdapter, RetryPolicy,
};
pub use gateway::{GatewayClient, InferenceOutcome};
pub use probe::HttpHealthProbe;
pub use registry::{
    DynamicRegistry, DynamicRegistryConfig, PollOutcome, RegistryError, SchemaError,
    StaticRegistry, parse_endpoint_document,
};
pub use sources::{InMemoryConfigSource, MountedConfigMapSource};
#[cfg(any(test, feature = "test-utils"))]
pub use testing::{ScriptedReply, ScriptedTransport};
pub use transport::{ReqwestTransport, ReqwestTransportConfig};
