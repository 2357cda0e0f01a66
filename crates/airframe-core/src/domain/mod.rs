//! Core domain types.
//!
//! These types represent the pure domain model, independent of any
//! infrastructure concerns (HTTP clients, config stores, etc.).
//!
//! # Structure
//!
//! - `endpoint` - Endpoint descriptors and backend kinds
//! - `health` - Health status and probe results
//! - `inference` - Inference requests (messages, tools, sampling knobs)
//! - `events` - Incremental inference stream events
//! - `error` - Categorized gateway errors

mod endpoint;
mod error;
mod events;
mod health;
mod inference;

pub use endpoint::{BackendKind, Capacity, EndpointDescriptor, ParseBackendKindError};
pub use error::{ErrorCategory, GatewayError};
pub use events::{InferenceStreamEvent, StreamEventKind, ToolCallDelta, Usage};
pub use health::{HealthState, HealthStatus};
pub use inference::{InferenceRequest, Message, MessageRole, ToolSpec};
