//! OpenAI-compatible chat completions adapter (`POST /v1/chat/completions`).
//!
//! Unlike the completion adapters, messages keep their roles and tool
//! definitions are forwarded.
//!
//! Streams end at the first chunk carrying a `finish_reason`. Usage is taken
//! from chunks up to and including that one. Servers that send usage in a
//! separate trailing chunk (`stream_options.include_usage`, `choices: []`)
//! have it dropped, and the request never asks for one.

use std::sync::Arc;

use airframe_core::{
    BackendAdapter, BackendKind, EndpointDescriptor, GatewayError, HttpTransport,
    InferenceRequest, InferenceStream, InferenceStreamEvent, ToolCallDelta, ToolSpec,
};
use serde_json::{Value, json};

use super::AdapterConfig;
use super::decoder::{ChunkOutcome, WireDialect, extract_usage, non_empty_str};
use super::exchange::run_exchange;
use super::llamacpp::merge_extra;

/// Chat completions wire shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatDialect;

fn tool_definition(tool: &ToolSpec) -> Value {
    let mut function = json!({ "name": tool.name });
    if let Some(description) = &tool.description {
        function["description"] = Value::String(description.clone());
    }
    function["parameters"] = tool
        .parameters
        .clone()
        .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
    json!({ "type": "function", "function": function })
}

/// Decode one entry of a `tool_calls` array.
fn tool_call(position: usize, call: &Value) -> InferenceStreamEvent {
    let index = call["index"]
        .as_u64()
        .and_then(|i| u32::try_from(i).ok())
        .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));
    InferenceStreamEvent::ToolCall {
        call: ToolCallDelta {
            index,
            id: non_empty_str(&call["id"]).map(String::from),
            name: non_empty_str(&call["function"]["name"]).map(String::from),
            arguments: call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        },
        raw: Some(call.clone()),
    }
}

fn tool_calls(calls: &Value) -> impl Iterator<Item = InferenceStreamEvent> + '_ {
    calls
        .as_array()
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(position, call)| tool_call(position, call))
}

impl WireDialect for ChatDialect {
    fn build_request(&self, request: &InferenceRequest) -> (&'static str, Value) {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({ "messages": messages, "stream": request.stream });
        if let Some(model) = &request.model {
            body["model"] = Value::String(model.clone());
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            body["tools"] = tools.iter().map(tool_definition).collect();
        }
        ("/v1/chat/completions", merge_extra(body, &request.extra_params))
    }

    fn interpret_chunk(&self, payload: &Value) -> ChunkOutcome {
        let choice = &payload["choices"][0];
        let delta = &choice["delta"];

        let mut events = Vec::new();
        if let Some(content) = non_empty_str(&delta["content"]) {
            events.push(InferenceStreamEvent::Token {
                content: content.to_string(),
                raw: Some(payload.clone()),
            });
        }
        events.extend(tool_calls(&delta["tool_calls"]));

        let finish_reason = non_empty_str(&choice["finish_reason"]).map(String::from);
        ChunkOutcome {
            events,
            usage: extract_usage(payload),
            finished: finish_reason.is_some(),
            finish_reason,
        }
    }

    fn interpret_response(&self, payload: Value) -> Result<Vec<InferenceStreamEvent>, GatewayError> {
        let choice = &payload["choices"][0];
        let message = choice
            .get("message")
            .filter(|m| m.is_object())
            .ok_or_else(|| GatewayError::parse("chat response carries no message"))?;

        let mut events: Vec<_> = tool_calls(&message["tool_calls"]).collect();
        let content = message["content"].as_str().unwrap_or_default().to_string();
        let finish_reason = non_empty_str(&choice["finish_reason"]).map(String::from);
        let usage = extract_usage(&payload);

        events.push(InferenceStreamEvent::Message {
            content,
            finish_reason: finish_reason.clone(),
            usage,
            raw: Some(payload.clone()),
        });
        events.push(InferenceStreamEvent::Done {
            finish_reason,
            usage,
            raw: None,
        });
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "openai-chat"
    }
}

/// Adapter for [`BackendKind::OpenAiCompatible`] endpoints.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    transport: Option<Arc<dyn HttpTransport>>,
    config: AdapterConfig,
}

impl std::fmt::Debug for OpenAiChatAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatAdapter")
            .field("has_transport", &self.transport.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl OpenAiChatAdapter {
    pub fn new(transport: Option<Arc<dyn HttpTransport>>, config: AdapterConfig) -> Self {
        Self { transport, config }
    }
}

impl BackendAdapter for OpenAiChatAdapter {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::OpenAiCompatible
    }

    fn stream_infer(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
    ) -> InferenceStream {
        run_exchange(
            self.transport.clone(),
            self.config,
            ChatDialect,
            endpoint,
            request,
        )
    }
}
