//! Server-sent-events decoding for OpenAI-style streaming responses.
//!
//! Bytes arrive in arbitrary pieces; a UTF-8 character or a `data:` line
//! may be split across two of them. The decoder buffers raw bytes and only
//! decodes complete lines.

use nova_core::provider::Usage;
use serde::Deserialize;
use tracing::{trace, warn};

/// One meaningful thing decoded from the stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SseEvent {
    /// A non-empty content delta.
    Delta(String),
    /// Final usage report (sent when `stream_options.include_usage` is set).
    Usage(Usage),
    /// An `{"error": {...}}` payload sent mid-stream.
    Error(String),
    /// The `[DONE]` sentinel.
    Done,
}

#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the events completed by them, in order.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            events.extend(parse_line(line.trim_end_matches(['\n', '\r'])));
        }
        events
    }
}

fn parse_line(line: &str) -> Vec<SseEvent> {
    // Blank lines separate events; lines starting with ':' are comments.
    if line.is_empty() || line.starts_with(':') {
        return vec![];
    }

    let Some(data) = line.strip_prefix("data:") else {
        trace!(line, "Ignoring non-data SSE field");
        return vec![];
    };
    let data = data.trim();

    if data == "[DONE]" {
        return vec![SseEvent::Done];
    }

    let chunk: StreamResponse = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            trace!(data, error = %e, "Ignoring unparseable SSE chunk");
            return vec![];
        }
    };

    if let Some(error) = chunk.error {
        warn!(message = %error.message, "Provider reported an error mid-stream");
        return vec![SseEvent::Error(error.message)];
    }

    let mut events = Vec::new();
    if let Some(content) = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty())
    {
        events.push(SseEvent::Delta(content));
    }
    if let Some(u) = chunk.usage {
        events.push(SseEvent::Usage(Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }));
    }
    events
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default = "unknown_stream_error")]
    message: String,
}

fn unknown_stream_error() -> String {
    "unknown provider error".into()
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
