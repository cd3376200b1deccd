//! Decoder for the backend's incremental response protocol.
//!
//! The backend writes one record per logical update: the `data:` marker, a
//! JSON object, and a blank line. Records may be split across transport
//! chunks at any byte, so lines are buffered until their newline arrives.
//!
//! [`FrameDecoder`] is the synchronous state machine. [`StreamReader`] wraps
//! it around a byte stream and exposes a pull-based `next_event`.

use std::collections::VecDeque;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use memchr::memchr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{StreamRecord, STREAM_RECORD_PREFIX};
use crate::core::chat_stream::TransportError;

pub const INCOMPLETE_STREAM_MESSAGE: &str = "The response stream ended before the reply was complete";

/// Raw body chunks as delivered by the transport.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDelta {
    /// Text carried by this record alone.
    pub delta: String,
    /// Best available cumulative text: the server's `fullContent` when it
    /// sent one, otherwise every delta so far concatenated.
    pub full_content: String,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(ContentDelta),
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitingFirstByte,
    Streaming,
    Complete,
    Failed,
    Cancelled,
}

impl DecoderState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DecoderState::Complete | DecoderState::Failed | DecoderState::Cancelled
        )
    }
}

/// Single-use decoder for one response. Once it reaches a terminal state every
/// further input is ignored; a retry needs a new request and a new decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    accumulated: String,
    state: DecoderState,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            accumulated: String::new(),
            state: DecoderState::AwaitingFirstByte,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Text reassembled so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Feed one transport chunk and return the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_finished() || chunk.is_empty() {
            return events;
        }
        if self.state == DecoderState::AwaitingFirstByte {
            self.state = DecoderState::Streaming;
        }

        self.buffer.extend_from_slice(chunk);
        let mut start = 0;
        while let Some(relative) = memchr(b'\n', &self.buffer[start..]) {
            let end = start + relative;
            let line = self.buffer[start..end].to_vec();
            start = end + 1;

            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            if self.is_finished() {
                // Anything after the terminal record is ignored.
                self.buffer.clear();
                return events;
            }
        }
        self.buffer.drain(..start);
        events
    }

    /// Signal end of input. A trailing record without its newline is still
    /// decoded; a stream that never produced a terminal record fails.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_finished() {
            return events;
        }

        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            if let Some(event) = self.process_line(&rest) {
                events.push(event);
            }
        }

        if !self.is_finished() {
            events.extend(self.fail(INCOMPLETE_STREAM_MESSAGE));
        }
        events
    }

    /// Terminate with a transport-level failure.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<StreamEvent> {
        if self.is_finished() {
            return None;
        }
        self.state = DecoderState::Failed;
        self.buffer.clear();
        Some(StreamEvent::Failed {
            message: message.into(),
        })
    }

    pub fn cancel(&mut self) {
        if !self.is_finished() {
            self.state = DecoderState::Cancelled;
            self.buffer.clear();
        }
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<StreamEvent> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                warn!("skipping stream line with invalid UTF-8: {err}");
                return None;
            }
        };

        // Blank separators, comments and unknown fields carry no record.
        let payload = line.strip_prefix(STREAM_RECORD_PREFIX).map(str::trim_start)?;
        if payload.is_empty() {
            return None;
        }

        let record = match serde_json::from_str::<StreamRecord>(payload) {
            Ok(record) => record,
            Err(err) => {
                warn!("skipping malformed stream record: {err}");
                return None;
            }
        };
        self.apply_record(record)
    }

    fn apply_record(&mut self, record: StreamRecord) -> Option<StreamEvent> {
        if let Some(error) = record.error {
            debug!("stream reported an error record");
            return self.fail(error);
        }

        let delta = record.content.unwrap_or_default();
        self.accumulated.push_str(&delta);
        let mut corrected = false;
        if let Some(full) = record.full_content.filter(|full| !full.is_empty()) {
            corrected = full != self.accumulated;
            if corrected {
                debug!(
                    local = self.accumulated.len(),
                    server = full.len(),
                    "adopting server cumulative content"
                );
            }
            self.accumulated = full;
        }

        if record.is_complete {
            self.state = DecoderState::Complete;
        } else if delta.is_empty() && !corrected {
            return None;
        }

        Some(StreamEvent::Content(ContentDelta {
            delta,
            full_content: self.accumulated.clone(),
            is_final: record.is_complete,
        }))
    }
}

enum Read {
    Cancelled,
    Chunk(Option<Result<Vec<u8>, TransportError>>),
}

/// Pull-based reader over a response body.
///
/// Each `next_event` suspends until a record completes or the body ends. The
/// body is dropped, releasing its connection, as soon as the decoder reaches a
/// terminal state or the cancellation token fires.
pub struct StreamReader {
    source: Option<ByteStream>,
    decoder: FrameDecoder,
    pending: VecDeque<StreamEvent>,
    cancel: Option<CancellationToken>,
}

impl StreamReader {
    pub fn new(source: ByteStream) -> Self {
        Self {
            source: Some(source),
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> DecoderState {
        self.decoder.state()
    }

    pub fn is_cancelled(&self) -> bool {
        self.decoder.state() == DecoderState::Cancelled
    }

    /// The next decoded event, or `None` once the stream is over.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.decoder.is_finished() {
                self.source = None;
                return None;
            }
            let source = self.source.as_mut()?;

            let read = match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Read::Cancelled,
                    chunk = source.next() => Read::Chunk(chunk),
                },
                None => Read::Chunk(source.next().await),
            };

            match read {
                Read::Cancelled => {
                    debug!("stream read cancelled");
                    self.decoder.cancel();
                }
                Read::Chunk(Some(Ok(bytes))) => {
                    let events = self.decoder.push(&bytes);
                    self.pending.extend(events);
                }
                Read::Chunk(Some(Err(err))) => {
                    warn!("stream transport error: {err}");
                    self.pending.extend(self.decoder.fail(err.to_string()));
                }
                Read::Chunk(None) => {
                    let events = self.decoder.finish();
                    self.pending.extend(events);
                }
            }

            if self.decoder.is_finished() {
                self.source = None;
            }
        }
    }
}
