//! Incremental decoder for push stream bodies.
//!
//! Network reads split messages at arbitrary byte offsets, so the decoder
//! buffers until a full line is available before interpreting it.
//!
//! SSE format:
//! ```text
//! : keep-alive
//!
//! event: update
//! id: 41
//! data: {"id":"e1","type":"metrics","value":{"a":1}}
//!
//! ```
//!
//! A line without a colon is a field with an empty value. An `id` field
//! applies to the event it appears in and is surfaced as [`Frame::Event`].
//!
//! NDJSON format is one JSON object per line; blank lines are keep-alives.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::ports::{Frame, FrameStream, TransportError};

/// Body framing of the push stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    #[default]
    Sse,
    Ndjson,
}

impl Framing {
    /// `Accept` header value requested for this framing.
    pub fn accept_header(&self) -> &'static str {
        match self {
            Framing::Sse => "text/event-stream",
            Framing::Ndjson => "application/x-ndjson",
        }
    }
}

#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buffer: Vec<u8>,
    data_lines: Vec<String>,
    event_id: Option<String>,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::new(),
            data_lines: Vec::new(),
            event_id: None,
        }
    }

    /// Feeds one chunk and returns every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(frame) = self.interpret(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a trailing unterminated line at end of body.
    ///
    /// An SSE event without its terminating blank line is incomplete and
    /// is dropped.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        self.data_lines.clear();
        self.event_id = None;
        match self.framing {
            Framing::Ndjson => {
                let line = String::from_utf8_lossy(&rest);
                let line = line.trim();
                (!line.is_empty()).then(|| Frame::Data(line.to_string()))
            }
            Framing::Sse => None,
        }
    }

    fn interpret(&mut self, line: &str) -> Option<Frame> {
        match self.framing {
            Framing::Ndjson => {
                let line = line.trim();
                if line.is_empty() {
                    Some(Frame::Heartbeat)
                } else {
                    Some(Frame::Data(line.to_string()))
                }
            }
            Framing::Sse => {
                if line.is_empty() {
                    return self.dispatch();
                }
                if line.starts_with(':') {
                    return Some(Frame::Heartbeat);
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                    None => (line, ""),
                };
                match field {
                    "data" => self.data_lines.push(value.to_string()),
                    // ids containing NUL are ignored
                    "id" if !value.contains('\0') => {
                        self.event_id = (!value.is_empty()).then(|| value.to_string());
                    }
                    _ => {}
                }
                None
            }
        }
    }

    /// Ends the current SSE event. An event whose data is empty is discarded.
    fn dispatch(&mut self) -> Option<Frame> {
        let id = self.event_id.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        if data.is_empty() {
            return None;
        }
        Some(match id {
            Some(id) => Frame::Event { id, data },
            None => Frame::Data(data),
        })
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    finished: bool,
}

/// Wraps a byte stream into a [`FrameStream`].
///
/// A body read error is yielded once and ends the stream.
pub fn decode_frames<S, B, E>(body: S, framing: Framing) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: FrameDecoder::new(framing),
        pending: VecDeque::new(),
        finished: false,
    };

    let frames = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(chunk.as_ref());
                    state.pending.extend(frames);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(TransportError::Stream(e.to_string())), state));
                }
                None => {
                    state.finished = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    });

    Box::pin(frames)
}
