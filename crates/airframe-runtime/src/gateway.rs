//! Gateway client: routes a request to the adapter for the endpoint's
//! backend kind and relays its events unchanged.
//!
//! The gateway holds no retry or health policy. Callers choose the endpoint
//! (typically via [`EndpointRegistry::first_healthy_endpoint`]).
//!
//! [`EndpointRegistry::first_healthy_endpoint`]: airframe_core::EndpointRegistry::first_healthy_endpoint

use std::collections::HashMap;
use std::sync::Arc;

use airframe_core::{
    BackendAdapter, BackendKind, EndpointDescriptor, GatewayError, HttpTransport,
    InferenceRequest, InferenceStream, InferenceStreamEvent, ToolCallDelta, Usage,
};
use async_stream::stream;
use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapters::{AdapterConfig, LlamaCppAdapter, OpenAiChatAdapter};

/// Accumulated result of a drained stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InferenceOutcome {
    /// Concatenated token and message content.
    pub content: String,
    /// Tool calls with fragments merged by index.
    pub tool_calls: Vec<ToolCallDelta>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    /// Non-fatal decode errors seen before the stream finished.
    pub decode_errors: Vec<GatewayError>,
}

impl InferenceOutcome {
    fn absorb(&mut self, event: InferenceStreamEvent) {
        match event {
            InferenceStreamEvent::Token { content, .. }
            | InferenceStreamEvent::Message { content, .. } => self.content.push_str(&content),
            InferenceStreamEvent::ToolCall { call, .. } => self.merge_tool_call(call),
            InferenceStreamEvent::Error { error } => self.decode_errors.push(error),
            InferenceStreamEvent::Done {
                finish_reason,
                usage,
                ..
            } => {
                self.finish_reason = finish_reason;
                self.usage = usage;
            }
        }
    }

    fn merge_tool_call(&mut self, delta: ToolCallDelta) {
        match self.tool_calls.iter_mut().find(|c| c.index == delta.index) {
            Some(call) => {
                if call.id.is_none() {
                    call.id = delta.id;
                }
                if call.name.is_none() {
                    call.name = delta.name;
                }
                call.arguments.push_str(&delta.arguments);
            }
            None => self.tool_calls.push(delta),
        }
    }
}

/// Routes requests to backend adapters by [`BackendKind`].
#[derive(Clone, Default)]
pub struct GatewayClient {
    adapters: HashMap<BackendKind, Arc<dyn BackendAdapter>>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("kinds", &self.supported_kinds())
            .finish()
    }
}

impl GatewayClient {
    /// A client with the default adapters (`llamacpp`, `openai`).
    pub fn new(transport: Option<Arc<dyn HttpTransport>>, config: AdapterConfig) -> Self {
        Self::empty()
            .with_adapter(Arc::new(LlamaCppAdapter::new(transport.clone(), config)))
            .with_adapter(Arc::new(OpenAiChatAdapter::new(transport, config)))
    }

    /// A client without adapters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register `adapter` for its backend kind, replacing any existing one.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Register `adapter` for its backend kind, replacing any existing one.
    pub fn register(&mut self, adapter: Arc<dyn BackendAdapter>) {
        self.adapters.insert(adapter.backend_kind(), adapter);
    }

    pub fn adapter_for(&self, kind: BackendKind) -> Option<Arc<dyn BackendAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Kinds with a registered adapter, in declaration order.
    pub fn supported_kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|k| self.adapters.contains_key(k))
            .collect()
    }

    /// Start an exchange with `endpoint`.
    pub fn stream_infer(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
    ) -> InferenceStream {
        match self.adapters.get(&endpoint.backend_kind) {
            Some(adapter) => {
                debug!(
                    endpoint = %endpoint.name,
                    kind = %endpoint.backend_kind,
                    "Dispatching inference request"
                );
                adapter.stream_infer(endpoint, request)
            }
            None => {
                let error = GatewayError::unknown(format!(
                    "no adapter registered for backend kind '{}'",
                    endpoint.backend_kind
                ));
                Box::pin(futures_util::stream::once(async move {
                    InferenceStreamEvent::error(error)
                }))
            }
        }
    }

    /// Like [`stream_infer`](Self::stream_infer), but the stream ends and the
    /// in-flight exchange is dropped as soon as `cancel_token` fires.
    pub fn stream_infer_with_cancel(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
        cancel_token: CancellationToken,
    ) -> InferenceStream {
        let mut inner = self.stream_infer(endpoint, request);
        let endpoint_name = endpoint.name.clone();
        Box::pin(stream! {
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel_token.cancelled() => {
                        debug!(endpoint = %endpoint_name, "Inference stream cancelled");
                        None
                    }
                    next = inner.next() => next,
                };
                match next {
                    Some(event) => yield event,
                    None => break,
                }
            }
            drop(inner);
        })
    }

    /// Drain a stream into an [`InferenceOutcome`].
    ///
    /// Fails with the stream's final event if that event is an error.
    pub async fn infer(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
    ) -> Result<InferenceOutcome, GatewayError> {
        let mut stream = self.stream_infer(endpoint, request);
        let mut outcome = InferenceOutcome::default();
        let mut last_error: Option<GatewayError> = None;

        while let Some(event) = stream.next().await {
            if let Some(previous) = last_error.take() {
                outcome.decode_errors.push(previous);
            }
            match event {
                InferenceStreamEvent::Error { error } => last_error = Some(error),
                other => outcome.absorb(other),
            }
        }

        match last_error {
            Some(error) => Err(error),
            None => Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedReply, ScriptedTransport};
    use airframe_core::ErrorCategory;
    use futures_util::stream;

    struct FixedAdapter {
        kind: BackendKind,
        events: Vec<InferenceStreamEvent>,
    }

    impl BackendAdapter for FixedAdapter {
        fn backend_kind(&self) -> BackendKind {
            self.kind
        }

        fn stream_infer(
            &self,
            _endpoint: &EndpointDescriptor,
            _request: &InferenceRequest,
        ) -> InferenceStream {
            Box::pin(stream::iter(self.events.clone()))
        }
    }

    fn endpoint(kind: BackendKind) -> EndpointDescriptor {
        EndpointDescriptor::new("ep", "http://h", kind)
    }

    #[tokio::test]
    async fn test_unknown_kind_yields_single_unknown_error() {
        let client = GatewayClient::new(None, AdapterConfig::default());
        assert_eq!(
            client.supported_kinds(),
            vec![BackendKind::LlamaCpp, BackendKind::OpenAiCompatible]
        );

        let events: Vec<_> = client
            .stream_infer(&endpoint(BackendKind::Anthropic), &InferenceRequest::prompt("hi"))
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        let error = events[0].gateway_error().unwrap();
        assert_eq!(error.category, ErrorCategory::Unknown);
        assert!(error.message.contains("anthropic"));
    }

    #[tokio::test]
    async fn test_override_beats_default() {
        let client = GatewayClient::new(None, AdapterConfig::default()).with_adapter(Arc::new(
            FixedAdapter {
                kind: BackendKind::LlamaCpp,
                events: vec![InferenceStreamEvent::token("fixed"), InferenceStreamEvent::done()],
            },
        ));
        let outcome = client
            .infer(&endpoint(BackendKind::LlamaCpp), &InferenceRequest::prompt("hi"))
            .await
            .unwrap();
        assert_eq!(outcome.content, "fixed");
    }

    #[tokio::test]
    async fn test_missing_transport_reports_unknown() {
        let client = GatewayClient::new(None, AdapterConfig::default());
        let err = client
            .infer(&endpoint(BackendKind::OpenAiCompatible), &InferenceRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::Unknown);
        assert_eq!(err.message, "transport not installed");
    }

    #[tokio::test]
    async fn test_infer_merges_tool_calls_and_keeps_decode_errors() {
        let client = GatewayClient::empty().with_adapter(Arc::new(FixedAdapter {
            kind: BackendKind::OpenAiCompatible,
            events: vec![
                InferenceStreamEvent::error(GatewayError::parse("bad line")),
                InferenceStreamEvent::ToolCall {
                    call: ToolCallDelta {
                        index: 0,
                        id: Some("call_1".into()),
                        name: Some("lookup".into()),
                        arguments: "{\"q\":".into(),
                    },
                    raw: None,
                },
                InferenceStreamEvent::ToolCall {
                    call: ToolCallDelta {
                        index: 0,
                        arguments: "\"rust\"}".into(),
                        ..ToolCallDelta::default()
                    },
                    raw: None,
                },
                InferenceStreamEvent::Done {
                    finish_reason: Some("tool_calls".into()),
                    usage: None,
                    raw: None,
                },
            ],
        }));

        let outcome = client
            .infer(&endpoint(BackendKind::OpenAiCompatible), &InferenceRequest::prompt("q"))
            .await
            .unwrap();
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].name.as_deref(), Some("lookup"));
        assert_eq!(outcome.tool_calls[0].arguments, "{\"q\":\"rust\"}");
        assert_eq!(outcome.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(outcome.decode_errors.len(), 1);
    }

    #[tokio::test]
    async fn test_infer_over_scripted_transport() {
        let transport = Arc::new(ScriptedTransport::with_replies([ScriptedReply::lines([
            r#"data: {"content":"Hel","stop":false}"#,
            r#"data: {"content":"lo","stop":false}"#,
            r#"data: {"content":"","stop":true,"stop_type":"eos","tokens_evaluated":3,"tokens_predicted":2}"#,
        ])]));
        let client = GatewayClient::new(
            Some(transport.clone() as Arc<dyn HttpTransport>),
            AdapterConfig::default(),
        );

        let outcome = client
            .infer(&endpoint(BackendKind::LlamaCpp), &InferenceRequest::prompt("hi"))
            .await
            .unwrap();
        assert_eq!(outcome.content, "Hello");
        assert_eq!(outcome.finish_reason.as_deref(), Some("eos"));
        assert_eq!(outcome.usage.unwrap().total_tokens, Some(5));
        assert_eq!(transport.requests()[0].url, "http://h/completion");
    }
}
