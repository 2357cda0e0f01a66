//! Inference stream events.
//!
//! Every request produces zero or more `Token`/`Message`/`ToolCall` events in
//! send order followed by exactly one terminal event (`Done` or `Error`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::GatewayError;

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Usage {
    /// Returns true if no count is known.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.total_tokens.is_none()
    }
}

/// One (possibly partial) tool call emitted by the model.
///
/// Streaming backends send tool calls in fragments; fragments sharing an
/// `index` belong to the same call and their `arguments` concatenate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: String,
}

/// Discriminant of [`InferenceStreamEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    Token,
    Message,
    ToolCall,
    Error,
    Done,
}

impl fmt::Display for StreamEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Token => "token",
            Self::Message => "message",
            Self::ToolCall => "tool_call",
            Self::Error => "error",
            Self::Done => "done",
        })
    }
}

/// An incremental event relayed from a backend.
///
/// `raw` holds the adapter-specific payload the event was decoded from and is
/// meant for debugging only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InferenceStreamEvent {
    /// Incremental text.
    Token {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
    /// A complete (non-streamed) response.
    Message {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
    /// A tool call or tool call fragment.
    ToolCall {
        call: ToolCallDelta,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
    /// Terminal failure.
    Error { error: GatewayError },
    /// Terminal success.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
}

impl InferenceStreamEvent {
    /// A token event without a raw payload.
    pub fn token(content: impl Into<String>) -> Self {
        Self::Token {
            content: content.into(),
            raw: None,
        }
    }

    /// A bare done event.
    #[must_use]
    pub const fn done() -> Self {
        Self::Done {
            finish_reason: None,
            usage: None,
            raw: None,
        }
    }

    /// An error event.
    #[must_use]
    pub const fn error(error: GatewayError) -> Self {
        Self::Error { error }
    }

    #[must_use]
    pub const fn kind(&self) -> StreamEventKind {
        match self {
            Self::Token { .. } => StreamEventKind::Token,
            Self::Message { .. } => StreamEventKind::Message,
            Self::ToolCall { .. } => StreamEventKind::ToolCall,
            Self::Error { .. } => StreamEventKind::Error,
            Self::Done { .. } => StreamEventKind::Done,
        }
    }

    /// Returns true for `Done` and `Error`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Text carried by token and message events.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Token { content, .. } | Self::Message { content, .. } => Some(content),
            _ => None,
        }
    }

    #[must_use]
    pub const fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        match self {
            Self::Message { finish_reason, .. } | Self::Done { finish_reason, .. } => {
                finish_reason.as_deref()
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn usage(&self) -> Option<&Usage> {
        match self {
            Self::Message { usage, .. } | Self::Done { usage, .. } => usage.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn raw(&self) -> Option<&Value> {
        match self {
            Self::Token { raw, .. }
            | Self::Message { raw, .. }
            | Self::ToolCall { raw, .. }
            | Self::Done { raw, .. } => raw.as_ref(),
            Self::Error { .. } => None,
        }
    }
}
