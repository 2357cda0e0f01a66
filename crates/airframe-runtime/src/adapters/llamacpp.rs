//! llama.cpp completion server adapter.
//!
//! Speaks either the native `/completion` API or, when the endpoint's
//! dialect hint is `openai`, the OpenAI-style `/v1/completions` API. Both
//! take a flat prompt: message contents are joined with `\n` and roles are
//! dropped.

use std::sync::Arc;

use airframe_core::{
    BackendAdapter, BackendKind, EndpointDescriptor, GatewayError, HttpTransport,
    InferenceRequest, InferenceStream, InferenceStreamEvent,
};
use serde_json::{Map, Value, json};

use super::AdapterConfig;
use super::decoder::{ChunkOutcome, WireDialect, extract_usage, non_empty_str};
use super::exchange::run_exchange;

/// Default `n_predict` when the request sets no `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// Default sampling temperature when the request sets none.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Request shape spoken by a llama.cpp server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDialect {
    /// `POST /completion`
    Native,
    /// `POST /v1/completions`
    OpenAiCompletions,
}

impl CompletionDialect {
    /// Pick the dialect from the endpoint's hint (case-insensitive `openai`).
    pub fn for_endpoint(endpoint: &EndpointDescriptor) -> Self {
        if endpoint.dialect_is("openai") {
            Self::OpenAiCompletions
        } else {
            Self::Native
        }
    }
}

fn flatten_prompt(request: &InferenceRequest) -> String {
    request
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merge `extra` into `body`; extra keys win.
pub(crate) fn merge_extra(mut body: Value, extra: &Map<String, Value>) -> Value {
    if let Value::Object(map) = &mut body {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }
    body
}

/// Text of a completion payload: `content`, or `choices[0].text`.
fn completion_text(payload: &Value) -> Option<&str> {
    payload["content"]
        .as_str()
        .or_else(|| payload["choices"][0]["text"].as_str())
}

fn completion_finish_reason(payload: &Value) -> Option<String> {
    non_empty_str(&payload["finish_reason"])
        .or_else(|| non_empty_str(&payload["choices"][0]["finish_reason"]))
        .or_else(|| non_empty_str(&payload["stop_type"]).filter(|t| *t != "none"))
        .map(String::from)
}

impl WireDialect for CompletionDialect {
    fn build_request(&self, request: &InferenceRequest) -> (&'static str, Value) {
        let prompt = flatten_prompt(request);
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        let (path, mut body) = match self {
            Self::Native => (
                "/completion",
                json!({
                    "prompt": prompt,
                    "n_predict": max_tokens,
                    "temperature": temperature,
                    "stream": request.stream,
                    "cache_prompt": true,
                }),
            ),
            Self::OpenAiCompletions => (
                "/v1/completions",
                json!({
                    "prompt": prompt,
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "stream": request.stream,
                }),
            ),
        };
        if let Some(model) = &request.model {
            body["model"] = Value::String(model.clone());
        }
        (path, merge_extra(body, &request.extra_params))
    }

    fn interpret_chunk(&self, payload: &Value) -> ChunkOutcome {
        let events = completion_text(payload)
            .filter(|text| !text.is_empty())
            .map(|text| InferenceStreamEvent::Token {
                content: text.to_string(),
                raw: Some(payload.clone()),
            })
            .into_iter()
            .collect();
        let finish_reason = completion_finish_reason(payload);
        let flagged = payload["stop"].as_bool().unwrap_or(false)
            || payload["done"].as_bool().unwrap_or(false);

        ChunkOutcome {
            events,
            usage: extract_usage(payload),
            finished: flagged || finish_reason.is_some(),
            finish_reason,
        }
    }

    fn interpret_response(&self, payload: Value) -> Result<Vec<InferenceStreamEvent>, GatewayError> {
        let content = completion_text(&payload)
            .ok_or_else(|| GatewayError::parse("completion response carries no content"))?
            .to_string();
        let finish_reason = completion_finish_reason(&payload);
        let usage = extract_usage(&payload);
        Ok(vec![
            InferenceStreamEvent::Message {
                content,
                finish_reason: finish_reason.clone(),
                usage,
                raw: Some(payload),
            },
            InferenceStreamEvent::Done {
                finish_reason,
                usage,
                raw: None,
            },
        ])
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Native => "llamacpp-native",
            Self::OpenAiCompletions => "llamacpp-openai",
        }
    }
}

/// Adapter for [`BackendKind::LlamaCpp`] endpoints.
#[derive(Clone)]
pub struct LlamaCppAdapter {
    transport: Option<Arc<dyn HttpTransport>>,
    config: AdapterConfig,
}

impl std::fmt::Debug for LlamaCppAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaCppAdapter")
            .field("has_transport", &self.transport.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl LlamaCppAdapter {
    pub fn new(transport: Option<Arc<dyn HttpTransport>>, config: AdapterConfig) -> Self {
        Self { transport, config }
    }
}

impl BackendAdapter for LlamaCppAdapter {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::LlamaCpp
    }

    fn stream_infer(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
    ) -> InferenceStream {
        run_exchange(
            self.transport.clone(),
            self.config,
            CompletionDialect::for_endpoint(endpoint),
            endpoint,
            request,
        )
    }
}
