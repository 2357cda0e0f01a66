//! Backend adapter port.
//!
//! One adapter per [`BackendKind`]. An adapter turns an [`InferenceRequest`]
//! into a lazy stream of [`InferenceStreamEvent`]s and owns every
//! wire-protocol detail of its backend.
//!
//! # Contract
//!
//! - The stream yields non-terminal events in wire order followed by exactly
//!   one terminal event (`done` or `error`), then ends.
//! - Failures are reported as an `error` event, never by panicking or by
//!   returning a Rust error.
//! - Nothing happens until the stream is first polled; dropping it aborts the
//!   in-flight HTTP exchange.

use std::pin::Pin;

use futures_core::Stream;

use crate::domain::{BackendKind, EndpointDescriptor, InferenceRequest, InferenceStreamEvent};

/// Boxed stream of inference events.
pub type InferenceStream = Pin<Box<dyn Stream<Item = InferenceStreamEvent> + Send>>;

/// Port for backend-specific request/response exchanges.
pub trait BackendAdapter: Send + Sync {
    /// The backend kind this adapter speaks.
    fn backend_kind(&self) -> BackendKind;

    /// Start an exchange with `endpoint`.
    ///
    /// The request is cloned into the stream; the caller keeps ownership.
    fn stream_infer(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
    ) -> InferenceStream;
}
