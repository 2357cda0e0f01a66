//! reqwest-backed [`HttpTransport`].
//!
//! Streaming bodies are split into lines as bytes arrive, so SSE payloads are
//! decoded incrementally without buffering the whole response.

use std::time::Duration;

use airframe_core::{
    GatewaySettings, HttpMethod, HttpRequest, HttpResponse, HttpTransport, LineStream,
    StreamingResponse, TransportError,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;
use futures_util::stream;
use tracing::debug;

/// Configuration for [`ReqwestTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReqwestTransportConfig {
    /// Deadline for establishing a connection.
    pub connect_timeout: Duration,
    /// Per-call deadline used when a request carries none.
    pub default_timeout: Duration,
}

impl Default for ReqwestTransportConfig {
    fn default() -> Self {
        let settings = GatewaySettings::default();
        Self {
            connect_timeout: settings.effective_connect_timeout(),
            default_timeout: settings.effective_request_timeout(),
        }
    }
}

impl ReqwestTransportConfig {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            connect_timeout: settings.effective_connect_timeout(),
            default_timeout: settings.effective_request_timeout(),
        }
    }
}

/// Production transport using reqwest (rustls).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport with its own connection pool.
    pub fn new(config: ReqwestTransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            default_timeout: config.default_timeout,
        })
    }

    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout.unwrap_or(self.default_timeout));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "Sending request");
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse { status, body })
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "Opening streaming request");
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let lines = split_lines(response.bytes_stream(), map_reqwest_error);
        Ok(StreamingResponse::new(status, lines))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// State threaded through the `unfold` stream.
struct LineState<S> {
    stream: S,
    buf: BytesMut,
    exhausted: bool,
}

/// Split a byte stream into `\n`-terminated lines.
///
/// `\r\n` endings are normalized. A trailing line without terminator is
/// flushed when the body ends. The first read error ends the stream.
pub(crate) fn split_lines<S, E>(byte_stream: S, map_err: fn(E) -> TransportError) -> LineStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    let state = LineState {
        stream: Box::pin(byte_stream),
        buf: BytesMut::new(),
        exhausted: false,
    };

    Box::pin(stream::unfold(state, move |mut st| async move {
        loop {
            if let Some(line_end) = find_newline(&st.buf) {
                let line = st.buf.split_to(line_end);
                return Some((Ok(decode_line(&line)), st));
            }

            if st.exhausted {
                if st.buf.is_empty() {
                    return None;
                }
                let rest = st.buf.split();
                return Some((Ok(decode_line(&rest)), st));
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.exhausted = true;
                    st.buf.clear();
                    return Some((Err(map_err(e)), st));
                }
                None => st.exhausted = true,
            }
        }
    }))
}

fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}
