//! HTTP transport port.
//!
//! Adapters and probes never talk to an HTTP client directly; they go through
//! [`HttpTransport`] so the rest of the system can be wired without network
//! capability (tests, offline tools). Absence of a transport is represented by
//! `Option<Arc<dyn HttpTransport>>` being `None` at the call site.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use serde_json::Value;
use thiserror::Error;

use crate::domain::ErrorCategory;

/// HTTP methods used by airframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
        })
    }
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// JSON body (sent with `content-type: application/json`).
    pub body: Option<Value>,
    /// Per-call deadline. `None` falls back to the transport default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(HttpMethod::Post, url)
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Any status of 400 and above is an error status.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Lines of a streaming response body, without line terminators.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// A response whose body is consumed line by line.
///
/// Dropping it closes the underlying connection.
pub struct StreamingResponse {
    pub status: u16,
    pub lines: LineStream,
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl StreamingResponse {
    pub fn new(status: u16, lines: LineStream) -> Self {
        Self { status, lines }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Drain the remaining body, joining lines with `\n`.
    ///
    /// Read errors end the body early; whatever was read is returned.
    pub async fn collect_body(mut self) -> String {
        let mut lines = Vec::new();
        while let Some(item) = self.lines.next().await {
            match item {
                Ok(line) => lines.push(line),
                Err(_) => break,
            }
        }
        lines.join("\n")
    }
}

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The per-call deadline elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established or was lost.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure (invalid URL, body read error, ...).
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Map onto the gateway failure taxonomy.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Connect(_) => ErrorCategory::Connection,
            Self::Other(_) => ErrorCategory::Backend,
        }
    }
}

/// Port for issuing HTTP requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and buffer the whole response body.
    ///
    /// Error statuses are returned as `Ok` responses; only transport failures
    /// are `Err`.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Send a request and return as soon as the status line is available.
    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let req = HttpRequest::post_json("http://h/completion", json!({"prompt": "x"}))
            .with_timeout(Duration::from_secs(3));
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.body.as_ref().unwrap()["prompt"], "x");
        assert_eq!(req.timeout, Some(Duration::from_secs(3)));

        assert_eq!(HttpRequest::head("http://h").method.to_string(), "HEAD");
    }

    #[test]
    fn test_error_status_boundary() {
        assert!(!HttpResponse::new(399, "").is_error());
        assert!(HttpResponse::new(400, "").is_error());
        assert!(HttpResponse::new(503, "").is_error());
    }

    #[test]
    fn test_transport_error_categories() {
        assert_eq!(
            TransportError::Timeout("t".into()).category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            TransportError::Connect("c".into()).category(),
            ErrorCategory::Connection
        );
        assert_eq!(
            TransportError::Other("o".into()).category(),
            ErrorCategory::Backend
        );
    }

    #[tokio::test]
    async fn test_collect_body_stops_at_read_error() {
        let lines = stream::iter(vec![
            Ok("{\"error\":".to_string()),
            Ok("\"boom\"}".to_string()),
            Err(TransportError::Other("reset".into())),
            Ok("never".to_string()),
        ]);
        let response = StreamingResponse::new(500, Box::pin(lines));
        assert_eq!(response.collect_body().await, "{\"error\":\n\"boom\"}");
    }
}
