//! Scripted in-memory [`HttpTransport`] for tests and offline tooling.
//!
//! Replies are consumed in FIFO order by both `send` and `send_streaming`;
//! every request is recorded for later inspection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use airframe_core::{
    HttpRequest, HttpResponse, HttpTransport, LineStream, StreamingResponse, TransportError,
};
use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream as futures_stream;

/// One canned outcome.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Fail at the transport level.
    Fail(TransportError),
    /// Respond with a buffered body (split on `\n` when streamed).
    Body { status: u16, body: String },
    /// Stream these lines, then optionally fail with a read error.
    Lines {
        status: u16,
        lines: Vec<String>,
        then_error: Option<TransportError>,
    },
    /// Stream these lines, then never finish. `dropped` is set once the
    /// body stream is dropped.
    Hanging {
        status: u16,
        lines: Vec<String>,
        dropped: Arc<AtomicBool>,
    },
}

impl ScriptedReply {
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::Body {
            status,
            body: body.to_string(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::Body {
            status,
            body: body.into(),
        }
    }

    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Lines {
            status: 200,
            lines: lines.into_iter().map(Into::into).collect(),
            then_error: None,
        }
    }

    pub fn lines_then_error<I, S>(lines: I, error: TransportError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Lines {
            status: 200,
            lines: lines.into_iter().map(Into::into).collect(),
            then_error: Some(error),
        }
    }

    /// A never-ending stream plus the flag that reports its drop.
    pub fn hanging<I, S>(lines: I) -> (Self, Arc<AtomicBool>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dropped = Arc::new(AtomicBool::new(false));
        let reply = Self::Hanging {
            status: 200,
            lines: lines.into_iter().map(Into::into).collect(),
            dropped: Arc::clone(&dropped),
        };
        (reply, dropped)
    }

    const fn status(&self) -> u16 {
        match self {
            Self::Fail(_) => 0,
            Self::Body { status, .. }
            | Self::Lines { status, .. }
            | Self::Hanging { status, .. } => *status,
        }
    }
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// In-memory transport that replays [`ScriptedReply`]s.
///
/// Once the script runs out every call fails with a connection error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transport preloaded with `replies`.
    pub fn with_replies(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    /// Append a reply to the script.
    pub fn push(&self, reply: ScriptedReply) {
        lock(&self.replies).push_back(reply);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }

    fn next_reply(&self, request: HttpRequest) -> Result<ScriptedReply, TransportError> {
        let url = request.url.clone();
        lock(&self.requests).push(request);
        match lock(&self.replies).pop_front() {
            Some(ScriptedReply::Fail(e)) => Err(e),
            Some(reply) => Ok(reply),
            None => Err(TransportError::Connect(format!("no scripted reply for {url}"))),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = self.next_reply(request)?;
        let status = reply.status();
        match reply {
            ScriptedReply::Body { body, .. } => Ok(HttpResponse { status, body }),
            ScriptedReply::Lines {
                lines, then_error, ..
            } => match then_error {
                Some(e) => Err(e),
                None => Ok(HttpResponse {
                    status,
                    body: lines.join("\n"),
                }),
            },
            ScriptedReply::Hanging { dropped, .. } => {
                let _flag = DropFlag(dropped);
                futures_util::future::pending::<()>().await;
                Err(TransportError::Other("unreachable".to_string()))
            }
            ScriptedReply::Fail(e) => Err(e),
        }
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let reply = self.next_reply(request)?;
        let status = reply.status();
        let lines: LineStream = match reply {
            ScriptedReply::Body { body, .. } => {
                let lines: Vec<Result<String, TransportError>> =
                    body.lines().map(|l| Ok(l.to_string())).collect();
                Box::pin(futures_stream::iter(lines))
            }
            ScriptedReply::Lines {
                lines, then_error, ..
            } => {
                let mut items: Vec<Result<String, TransportError>> =
                    lines.into_iter().map(Ok).collect();
                items.extend(then_error.map(Err));
                Box::pin(futures_stream::iter(items))
            }
            ScriptedReply::Hanging { lines, dropped, .. } => {
                let flag = DropFlag(dropped);
                Box::pin(stream! {
                    let _flag = flag;
                    for line in lines {
                        yield Ok::<_, TransportError>(line);
                    }
                    futures_util::future::pending::<()>().await;
                })
            }
            ScriptedReply::Fail(e) => return Err(e),
        };
        Ok(StreamingResponse::new(status, lines))
    }
}
