//! The retrying request/response exchange shared by every adapter.
//!
//! Transport failures are retried with backoff as long as nothing has been
//! emitted for the attempt. HTTP error statuses on a streaming request are
//! reported at once; on a buffered request they are retried like transport
//! failures. Every outcome ends the stream with exactly one terminal event.

use std::sync::Arc;

use airframe_core::{
    EndpointDescriptor, GatewayError, HttpRequest, HttpTransport, InferenceRequest,
    InferenceStream, InferenceStreamEvent, TransportError,
};
use async_stream::stream;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use super::AdapterConfig;
use super::decoder::{StreamDecoder, WireDialect};
use crate::probe::TRANSPORT_NOT_INSTALLED;

fn transport_failure(e: &TransportError) -> GatewayError {
    GatewayError::new(e.category(), e.to_string())
}

/// Run one exchange of `request` against `endpoint` in `dialect`.
///
/// The request is built eagerly; no I/O happens until the stream is polled.
pub(crate) fn run_exchange<D: WireDialect>(
    transport: Option<Arc<dyn HttpTransport>>,
    config: AdapterConfig,
    dialect: D,
    endpoint: &EndpointDescriptor,
    request: &InferenceRequest,
) -> InferenceStream {
    let endpoint_name = endpoint.name.clone();
    let (url, body) = dialect.request_for(endpoint, request);
    let streaming = request.stream;

    Box::pin(stream! {
        let Some(transport) = transport else {
            yield InferenceStreamEvent::error(GatewayError::unknown(TRANSPORT_NOT_INSTALLED));
            return;
        };
        let policy = config.retry;
        let mut attempt: u32 = 0;

        loop {
            let http = HttpRequest::post_json(url.clone(), body.clone())
                .with_timeout(config.request_timeout);
            debug!(
                endpoint = %endpoint_name,
                dialect = dialect.name(),
                attempt,
                streaming,
                "Starting exchange"
            );

            let failure = if streaming {
                match transport.send_streaming(http).await {
                    Err(e) => e,
                    Ok(response) if response.is_error() => {
                        let status = response.status;
                        let raw = response.collect_body().await;
                        warn!(endpoint = %endpoint_name, status, "Backend rejected streaming request");
                        yield InferenceStreamEvent::error(
                            GatewayError::backend(format!("HTTP {status}")).with_raw(raw),
                        );
                        return;
                    }
                    Ok(response) => {
                        let mut lines = response.lines;
                        let mut decoder = StreamDecoder::new(dialect.clone());
                        let mut emitted = false;
                        loop {
                            match lines.next().await {
                                Some(Ok(line)) => {
                                    for event in decoder.feed(&line) {
                                        emitted = true;
                                        yield event;
                                    }
                                    if decoder.is_finished() {
                                        return;
                                    }
                                }
                                Some(Err(e)) if emitted => {
                                    warn!(endpoint = %endpoint_name, error = %e, "Stream failed after output; not retrying");
                                    yield InferenceStreamEvent::error(transport_failure(&e));
                                    return;
                                }
                                Some(Err(e)) => break e,
                                None => {
                                    if let Some(done) = decoder.finish() {
                                        yield done;
                                    }
                                    return;
                                }
                            }
                        }
                    }
                }
            } else {
                match transport.send(http).await {
                    Err(e) => e,
                    Ok(response) if response.is_error() => {
                        let status = response.status;
                        if policy.is_last(attempt) {
                            warn!(endpoint = %endpoint_name, status, attempt, "Backend error on final attempt");
                            yield InferenceStreamEvent::error(
                                GatewayError::backend(format!("HTTP {status}")).with_raw(response.body),
                            );
                            return;
                        }
                        TransportError::Other(format!("HTTP {status}"))
                    }
                    Ok(response) => {
                        match serde_json::from_str::<Value>(&response.body) {
                            Ok(payload) => match dialect.interpret_response(payload) {
                                Ok(events) => {
                                    for event in events {
                                        yield event;
                                    }
                                }
                                Err(error) => {
                                    yield InferenceStreamEvent::error(error.with_raw(response.body));
                                }
                            },
                            Err(e) => {
                                yield InferenceStreamEvent::error(
                                    GatewayError::parse(format!("invalid response body: {e}"))
                                        .with_raw(response.body),
                                );
                            }
                        }
                        return;
                    }
                }
            };

            if policy.is_last(attempt) {
                warn!(endpoint = %endpoint_name, attempt, error = %failure, "Giving up after final attempt");
                yield InferenceStreamEvent::error(transport_failure(&failure));
                return;
            }

            let delay = policy.delay_for(attempt);
            warn!(
                endpoint = %endpoint_name,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %failure,
                "Exchange failed; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    })
}
