//! Wire dialects and the incremental stream decoder.
//!
//! A [`WireDialect`] knows one backend's request and response shapes. The
//! [`StreamDecoder`] drives a dialect over SSE lines and enforces the event
//! contract: at most one `done`, nothing after it.

use airframe_core::{
    EndpointDescriptor, GatewayError, InferenceRequest, InferenceStreamEvent, Usage,
};
use serde_json::Value;

use super::sse::{SseFrame, decode_line};

/// What a dialect made of one streamed payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOutcome {
    /// Non-terminal events, in payload order.
    pub events: Vec<InferenceStreamEvent>,
    /// Token accounting carried by the payload.
    pub usage: Option<Usage>,
    /// Set when the payload ends the response.
    pub finished: bool,
    pub finish_reason: Option<String>,
}

/// One backend's request and response shapes.
pub trait WireDialect: Clone + Send + Sync + 'static {
    /// Request path and JSON body for an exchange.
    fn build_request(&self, request: &InferenceRequest) -> (&'static str, Value);

    /// Interpret one streamed JSON payload.
    fn interpret_chunk(&self, payload: &Value) -> ChunkOutcome;

    /// Interpret a complete non-streaming response body.
    fn interpret_response(&self, payload: Value) -> Result<Vec<InferenceStreamEvent>, GatewayError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Build the full request URL for `endpoint`.
    fn request_for(&self, endpoint: &EndpointDescriptor, request: &InferenceRequest) -> (String, Value) {
        let (path, body) = self.build_request(request);
        (endpoint.url_for(path), body)
    }
}

/// Incremental decoder for one streamed response.
#[derive(Debug, Clone)]
pub struct StreamDecoder<D> {
    dialect: D,
    usage: Option<Usage>,
    finished: bool,
}

impl<D: WireDialect> StreamDecoder<D> {
    pub const fn new(dialect: D) -> Self {
        Self {
            dialect,
            usage: None,
            finished: false,
        }
    }

    /// Returns true once `done` has been produced.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode one line of the body.
    ///
    /// Undecodable payloads yield a `parse` error event and decoding
    /// continues. Once finished, every further line is ignored.
    pub fn feed(&mut self, line: &str) -> Vec<InferenceStreamEvent> {
        if self.finished {
            return Vec::new();
        }

        let payload = match decode_line(line) {
            None => return Vec::new(),
            Some(SseFrame::Done) => return vec![self.finish_with(None, None)],
            Some(SseFrame::Data(data)) => data,
        };

        let value = match serde_json::from_str::<Value>(payload) {
            Ok(value) => value,
            Err(e) => {
                return vec![InferenceStreamEvent::error(
                    GatewayError::parse(format!("invalid stream payload: {e}")).with_raw(payload),
                )];
            }
        };

        let outcome = self.dialect.interpret_chunk(&value);
        if outcome.usage.is_some() {
            self.usage = outcome.usage;
        }
        let mut events = outcome.events;
        if outcome.finished {
            events.push(self.finish_with(outcome.finish_reason, Some(value)));
        }
        events
    }

    /// End of body. Produces `done` if the stream never finished on its own.
    pub fn finish(&mut self) -> Option<InferenceStreamEvent> {
        (!self.finished).then(|| self.finish_with(None, None))
    }

    fn finish_with(&mut self, finish_reason: Option<String>, raw: Option<Value>) -> InferenceStreamEvent {
        self.finished = true;
        InferenceStreamEvent::Done {
            finish_reason,
            usage: self.usage,
            raw,
        }
    }
}

/// A string field that is present and non-empty.
pub(crate) fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

/// Token accounting from a `usage` object or llama.cpp's
/// `tokens_evaluated`/`tokens_predicted`.
pub(crate) fn extract_usage(payload: &Value) -> Option<Usage> {
    if let Some(usage) = payload.get("usage").filter(|u| u.is_object()) {
        let usage = Usage {
            prompt_tokens: usage["prompt_tokens"].as_u64(),
            completion_tokens: usage["completion_tokens"].as_u64(),
            total_tokens: usage["total_tokens"].as_u64(),
        };
        return (!usage.is_empty()).then_some(usage);
    }

    let prompt = payload["tokens_evaluated"].as_u64();
    let completion = payload["tokens_predicted"].as_u64();
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt.zip(completion).map(|(p, c)| p + c),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Minimal dialect: `text` becomes a token, `end` finishes.
    #[derive(Clone)]
    struct EchoDialect;

    impl WireDialect for EchoDialect {
        fn build_request(&self, _request: &InferenceRequest) -> (&'static str, Value) {
            ("/echo", json!({}))
        }

        fn interpret_chunk(&self, payload: &Value) -> ChunkOutcome {
            ChunkOutcome {
                events: non_empty_str(&payload["text"])
                    .map(InferenceStreamEvent::token)
                    .into_iter()
                    .collect(),
                usage: extract_usage(payload),
                finished: payload["end"].as_bool().unwrap_or(false),
                finish_reason: payload["reason"].as_str().map(String::from),
            }
        }

        fn interpret_response(
            &self,
            _payload: Value,
        ) -> Result<Vec<InferenceStreamEvent>, GatewayError> {
            Ok(vec![InferenceStreamEvent::done()])
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[test]
    fn test_nothing_after_done() {
        let mut decoder = StreamDecoder::new(EchoDialect);
        assert_eq!(decoder.feed(r#"data: {"text":"a"}"#).len(), 1);
        let events = decoder.feed(r#"data: {"text":"b","end":true,"reason":"stop"}"#);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].finish_reason(), Some("stop"));
        assert!(events[1].raw().is_some());

        assert!(decoder.feed(r#"data: {"text":"late"}"#).is_empty());
        assert!(decoder.feed("data: [DONE]").is_empty());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_parse_error_is_not_fatal() {
        let mut decoder = StreamDecoder::new(EchoDialect);
        let events = decoder.feed("data: {broken");
        let error = events[0].gateway_error().unwrap();
        assert_eq!(error.category, airframe_core::ErrorCategory::Parse);
        assert_eq!(error.raw_backend.as_deref(), Some("{broken"));
        assert!(!decoder.is_finished());

        assert_eq!(decoder.feed(r#"{"text":"ok"}"#)[0].content(), Some("ok"));
    }

    #[test]
    fn test_end_of_body_and_sentinel_produce_single_done() {
        let mut decoder = StreamDecoder::new(EchoDialect);
        decoder.feed(r#"{"text":"x","usage":{"completion_tokens":1}}"#);
        let done = decoder.finish().unwrap();
        assert_eq!(done.usage().and_then(|u| u.completion_tokens), Some(1));
        assert!(decoder.finish().is_none());

        let mut decoder = StreamDecoder::new(EchoDialect);
        let events = decoder.feed("data: [DONE]");
        assert!(matches!(events[..], [InferenceStreamEvent::Done { .. }]));
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_extract_usage_variants() {
        let usage = extract_usage(&json!({"usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}})).unwrap();
        assert_eq!(usage.total_tokens, Some(7));

        let usage = extract_usage(&json!({"tokens_evaluated": 10, "tokens_predicted": 5})).unwrap();
        assert_eq!(usage.prompt_tokens, Some(10));
        assert_eq!(usage.total_tokens, Some(15));

        assert!(extract_usage(&json!({"usage": null})).is_none());
        assert!(extract_usage(&json!({"content": "x"})).is_none());
    }
}
