//! End-to-end exchanges through `GatewayClient` over a scripted transport.
//!
//! No network access is needed: every reply comes from `ScriptedTransport`.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use airframe_core::{
    BackendKind, EndpointDescriptor, ErrorCategory, HttpTransport, InferenceRequest,
    InferenceStreamEvent, StreamEventKind, TransportError,
};
use airframe_runtime::{AdapterConfig, GatewayClient, RetryPolicy, ScriptedReply, ScriptedTransport};
use futures_util::StreamExt;
use serde_json::json;
use tokio_test::{assert_pending, assert_ready_eq};
use tokio_util::sync::CancellationToken;

// ── Helpers ────────────────────────────────────────────────────────

fn llamacpp() -> EndpointDescriptor {
    EndpointDescriptor::new("local", "http://127.0.0.1:8080", BackendKind::LlamaCpp)
}

fn client_over(transport: &Arc<ScriptedTransport>) -> GatewayClient {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    GatewayClient::new(Some(transport), AdapterConfig::default())
}

fn kinds(events: &[InferenceStreamEvent]) -> Vec<StreamEventKind> {
    events.iter().map(InferenceStreamEvent::kind).collect()
}

// ── Streaming ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_lines_after_stop_are_ignored() {
    let transport = Arc::new(ScriptedTransport::with_replies([ScriptedReply::lines([
        r#"data: {"content":"Hi","stop":false}"#,
        r#"data: {"content":"","stop":true}"#,
        r#"data: {"content":"ignored","stop":false}"#,
    ])]));

    let events: Vec<_> = client_over(&transport)
        .stream_infer(&llamacpp(), &InferenceRequest::prompt("hello"))
        .collect()
        .await;

    assert_eq!(kinds(&events), vec![StreamEventKind::Token, StreamEventKind::Done]);
    assert_eq!(events[0].content(), Some("Hi"));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_streaming_http_error_is_reported_once_without_retry() {
    let transport = Arc::new(ScriptedTransport::with_replies([ScriptedReply::text(
        500,
        r#"{"error":"model not loaded"}"#,
    )]));

    let events: Vec<_> = client_over(&transport)
        .stream_infer(&llamacpp(), &InferenceRequest::prompt("hello"))
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    let error = events[0].gateway_error().unwrap();
    assert_eq!(error.category, ErrorCategory::Backend);
    assert_eq!(
        error.raw_backend.as_deref(),
        Some(r#"{"error":"model not loaded"}"#)
    );
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_read_error_after_output_is_terminal() {
    let transport = Arc::new(ScriptedTransport::with_replies([
        ScriptedReply::lines_then_error(
            [r#"data: {"content":"partial","stop":false}"#],
            TransportError::Connect("connection reset".into()),
        ),
        ScriptedReply::lines([r#"data: {"content":"never","stop":true}"#]),
    ]));

    let events: Vec<_> = client_over(&transport)
        .stream_infer(&llamacpp(), &InferenceRequest::prompt("hello"))
        .collect()
        .await;

    assert_eq!(kinds(&events), vec![StreamEventKind::Token, StreamEventKind::Error]);
    assert_eq!(
        events[1].gateway_error().unwrap().category,
        ErrorCategory::Connection
    );
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test]
async fn test_openai_chat_stream_with_done_sentinel() {
    let transport = Arc::new(ScriptedTransport::with_replies([ScriptedReply::lines([
        ": keep-alive",
        r#"data: {"choices":[{"delta":{"content":"Bon"},"finish_reason":null}]}"#,
        "",
        r#"data: {"choices":[{"delta":{"content":"jour"},"finish_reason":null}]}"#,
        "data: [DONE]",
    ])]));
    let endpoint = EndpointDescriptor::new("cloud", "https://api.example.com", BackendKind::OpenAiCompatible);

    let outcome = client_over(&transport)
        .infer(&endpoint, &InferenceRequest::prompt("greet").with_model("gpt-4o-mini"))
        .await
        .unwrap();

    assert_eq!(outcome.content, "Bonjour");
    assert!(outcome.finish_reason.is_none());
    let sent = &transport.requests()[0];
    assert_eq!(sent.url, "https://api.example.com/v1/chat/completions");
    assert_eq!(sent.body.as_ref().unwrap()["model"], "gpt-4o-mini");
}

// ── Retry ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_connection_failures_back_off_exponentially() {
    let transport = Arc::new(ScriptedTransport::with_replies([
        ScriptedReply::Fail(TransportError::Connect("refused".into())),
        ScriptedReply::Fail(TransportError::Connect("refused".into())),
        ScriptedReply::Fail(TransportError::Connect("refused".into())),
    ]));
    let config = AdapterConfig::new(
        RetryPolicy::new(3, Duration::from_secs(1)).unwrap(),
        Duration::from_secs(30),
    )
    .unwrap();
    let dyn_transport: Arc<dyn HttpTransport> = transport.clone();
    let client = GatewayClient::new(Some(dyn_transport), config);

    let started = tokio::time::Instant::now();
    let events: Vec<_> = client
        .stream_infer(&llamacpp(), &InferenceRequest::prompt("hello"))
        .collect()
        .await;
    let elapsed = started.elapsed();

    // Sleeps of 1s and 2s between the three attempts.
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
    assert_eq!(transport.request_count(), 3);
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].gateway_error().unwrap().category,
        ErrorCategory::Connection
    );
}

#[tokio::test(start_paused = true)]
async fn test_buffered_request_recovers_after_timeout() {
    let transport = Arc::new(ScriptedTransport::with_replies([
        ScriptedReply::Fail(TransportError::Timeout("deadline".into())),
        ScriptedReply::json(200, &json!({"content": "recovered", "stop_type": "eos"})),
    ]));

    let outcome = client_over(&transport)
        .infer(&llamacpp(), &InferenceRequest::prompt("hello").with_stream(false))
        .await
        .unwrap();

    assert_eq!(outcome.content, "recovered");
    assert_eq!(outcome.finish_reason.as_deref(), Some("eos"));
    assert_eq!(transport.request_count(), 2);
}

// ── Cancellation ───────────────────────────────────────────────────

#[tokio::test]
async fn test_cancellation_drops_in_flight_exchange() {
    let (reply, dropped) = ScriptedReply::hanging([r#"data: {"content":"Hi","stop":false}"#]);
    let transport = Arc::new(ScriptedTransport::with_replies([reply]));
    let token = CancellationToken::new();

    let mut stream = client_over(&transport).stream_infer_with_cancel(
        &llamacpp(),
        &InferenceRequest::prompt("hello"),
        token.clone(),
    );

    let first = stream.next().await.unwrap();
    assert_eq!(first.content(), Some("Hi"));

    {
        let mut next = tokio_test::task::spawn(stream.next());
        assert_pending!(next.poll());
        assert!(!dropped.load(Ordering::SeqCst));

        token.cancel();
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), None);
    }
    assert!(dropped.load(Ordering::SeqCst));

    // A second cancel is a no-op.
    token.cancel();
    assert!(stream.next().await.is_none());
}
