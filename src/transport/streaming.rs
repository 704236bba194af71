//! Stream-chat frame parsing.
//!
//! The backend answers `stream-chat` with newline-delimited frames:
//!
//! ```text
//! data: {"uuid":"…","type":"textResponseChunk","textResponse":"Hi","close":false}
//! data: {"uuid":"…","type":"textResponseChunk","textResponse":" there","close":true}
//! data: [DONE]
//! ```
//!
//! Network reads split frames at arbitrary byte offsets, so incomplete lines
//! are buffered until their newline arrives.

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};

use super::TransportError;
use crate::errors::AnythingLlmError;

/// Literal prefix stripped from each frame.
pub const DATA_PREFIX: &str = "data:";

/// Literal frame that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Streaming HTTP response.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Byte stream.
    pub stream: Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
}

impl StreamingResponse {
    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// JSON payload of one frame. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamFrame {
    /// Chunk identifier.
    #[serde(default)]
    pub uuid: Option<String>,
    /// Frame type (`textResponseChunk`, `abort`, …).
    #[serde(default, rename = "type")]
    pub frame_type: Option<String>,
    /// Text delta.
    #[serde(default, rename = "textResponse")]
    pub text_response: Option<String>,
    /// Whether this frame closes the stream.
    #[serde(default)]
    pub close: bool,
    /// Error reported by the backend; `false`, `null` or a message.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl StreamFrame {
    /// Returns the backend error message, if the frame carries one.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.as_str()).filter(|s| !s.is_empty())
    }
}

/// Event produced by the frame parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text delta to append to the answer.
    Delta(String),
    /// A frame with `close: true`.
    Close,
    /// The end sentinel.
    Done,
}

impl StreamEvent {
    /// Returns true for events that end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Close | StreamEvent::Done)
    }
}

/// Incremental parser turning raw body chunks into stream events.
///
/// Each non-empty `textResponse` is emitted unchanged as a
/// [`StreamEvent::Delta`]; empty strings are not emitted. Once a terminal
/// event has been produced, further input is ignored.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    finished: bool,
    skipped: usize,
}

impl FrameParser {
    /// Creates a new frame parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once a close frame or the end sentinel was seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of frames dropped because they were not valid JSON.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    /// Feeds a chunk of body bytes and returns the events of every line it
    /// completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.parse_line(&line[..line.len() - 1], &mut events);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }

        events
    }

    /// Flushes a trailing line that never got its newline.
    ///
    /// If that line is incomplete JSON it is dropped.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.finished && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.parse_line(&line, &mut events);
        }
        self.buffer.clear();
        events
    }

    fn parse_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();

        if line.is_empty() || line.starts_with(':') {
            return;
        }

        let payload = line
            .strip_prefix(DATA_PREFIX)
            .map(str::trim_start)
            .unwrap_or(line);

        if payload.is_empty() {
            return;
        }

        if payload == DONE_SENTINEL {
            self.finished = true;
            events.push(StreamEvent::Done);
            return;
        }

        let frame = match serde_json::from_str::<StreamFrame>(payload) {
            Ok(frame) => frame,
            Err(e) => {
                self.skipped += 1;
                tracing::debug!(error = %e, data = %payload, "Skipping malformed stream frame");
                return;
            }
        };

        if let Some(message) = frame.error_message() {
            tracing::warn!(frame_type = ?frame.frame_type, error = %message, "Backend reported an error in stream");
        }

        if let Some(text) = frame.text_response {
            if !text.is_empty() {
                events.push(StreamEvent::Delta(text));
            }
        }

        if frame.close {
            self.finished = true;
            events.push(StreamEvent::Close);
        }
    }
}

pin_project! {
    /// Stream of text deltas from a stream-chat response.
    ///
    /// Yields each `textResponse` in byte-stream order and ends on a close
    /// frame, the end sentinel, or the end of the body. Dropping the stream
    /// releases the underlying body reader.
    pub struct DeltaStream {
        #[pin]
        inner: Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
        parser: FrameParser,
        pending: VecDeque<String>,
        done: bool,
        received_bytes: usize,
        accumulated_content: String,
    }
}

impl DeltaStream {
    /// Creates a delta stream from a successful streaming response.
    pub fn new(response: StreamingResponse) -> Result<Self, AnythingLlmError> {
        if !response.is_success() {
            return Err(AnythingLlmError::from_status(
                response.status,
                format!("Unexpected status code: {}", response.status),
            ));
        }

        Ok(Self {
            inner: response.stream,
            parser: FrameParser::new(),
            pending: VecDeque::new(),
            done: false,
            received_bytes: 0,
            accumulated_content: String::new(),
        })
    }

    /// Collects the remaining deltas into the complete answer.
    pub async fn collect_text(self) -> Result<String, AnythingLlmError> {
        use futures::TryStreamExt;

        let deltas: Vec<String> = self.try_collect().await?;
        Ok(deltas.concat())
    }

    /// Returns the content delivered so far.
    pub fn accumulated_content(&self) -> &str {
        &self.accumulated_content
    }

    /// Returns how many malformed frames were skipped so far.
    pub fn skipped_frames(&self) -> usize {
        self.parser.skipped_frames()
    }
}

impl Stream for DeltaStream {
    type Item = Result<String, AnythingLlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(delta) = this.pending.pop_front() {
                this.accumulated_content.push_str(&delta);
                return Poll::Ready(Some(Ok(delta)));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    *this.received_bytes += bytes.len();
                    for event in this.parser.push(&bytes) {
                        match event {
                            StreamEvent::Delta(text) => this.pending.push_back(text),
                            StreamEvent::Close | StreamEvent::Done => *this.done = true,
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    this.pending.clear();
                    return Poll::Ready(Some(Err(AnythingLlmError::Stream {
                        message: e.to_string(),
                        partial_content: Some(this.accumulated_content.clone()),
                    })));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    if *this.received_bytes == 0 {
                        return Poll::Ready(Some(Err(AnythingLlmError::EmptyStream)));
                    }
                    for event in this.parser.finish() {
                        if let StreamEvent::Delta(text) = event {
                            this.pending.push_back(text);
                        }
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
