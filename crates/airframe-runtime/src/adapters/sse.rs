//! Server-sent-events line framing.
//!
//! Backends emit either `data: <json>` frames or bare JSON lines. Only the
//! payload matters here; SSE comments and non-data fields are framing.

/// A decoded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseFrame<'a> {
    /// One JSON payload, not yet parsed.
    Data(&'a str),
    /// The `[DONE]` sentinel.
    Done,
}

const DONE_SENTINEL: &str = "[DONE]";
const SKIPPED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// Decode one line. Returns `None` for lines carrying no payload.
pub fn decode_line(line: &str) -> Option<SseFrame<'_>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        None if SKIPPED_FIELDS.iter().any(|f| trimmed.starts_with(f)) => return None,
        None => trimmed,
    };

    match payload {
        "" => None,
        DONE_SENTINEL => Some(SseFrame::Done),
        data => Some(SseFrame::Data(data)),
    }
}
