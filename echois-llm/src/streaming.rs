//! Incremental token stream over the chat completion SSE wire format.
//!
//! The upstream API frames content deltas as `data: <json>` lines and ends
//! the stream with a `data: [DONE]` sentinel. HTTP chunk boundaries do not
//! respect line boundaries, so bytes are buffered until a full line is
//! available before parsing.

use crate::error::{LlmError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::{debug, warn};

/// One upstream event, after SSE framing and JSON decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental text fragment from the model.
    Delta(String),
    /// The explicit `[DONE]` completion sentinel.
    Done,
}

/// A pull-based source of token events, one at a time.
///
/// The orchestrator suspends on `next_event` between reads; `None` means the
/// upstream ended without an explicit sentinel.
#[async_trait]
pub trait TokenSource: Send {
    async fn next_event(&mut self) -> Option<Result<StreamEvent>>;
}

impl std::fmt::Debug for dyn TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn TokenSource")
    }
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Box<T> {
    async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        (**self).next_event().await
    }
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Adapter from a raw byte stream to [`StreamEvent`]s.
pub struct SseTokenStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>,
    buf: Vec<u8>,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl SseTokenStream {
    pub fn new<S>(bytes: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(bytes),
            buf: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Consume every complete line currently buffered.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop(); // trailing '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        if self.finished {
            return;
        }
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let Some(payload) = line.strip_prefix("data:") else {
            // Comment lines and other SSE fields carry no content.
            debug!("Skipping non-data upstream line");
            return;
        };
        let payload = payload.trim();

        if payload == "[DONE]" {
            self.pending.push_back(StreamEvent::Done);
            self.finished = true;
            return;
        }

        // A malformed payload is recoverable: log and keep reading.
        match serde_json::from_str::<ChunkPayload>(payload) {
            Ok(chunk) => {
                let delta = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content);
                if let Some(text) = delta {
                    if !text.is_empty() {
                        self.pending.push_back(StreamEvent::Delta(text));
                    }
                }
            }
            Err(e) => {
                warn!("Skipping malformed upstream payload: {}", e);
            }
        }
    }
}

#[async_trait]
impl TokenSource for SseTokenStream {
    async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    self.buf.extend_from_slice(&chunk);
                    self.drain_lines();
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    // A final line may arrive without a trailing newline.
                    let rest = std::mem::take(&mut self.buf);
                    if !rest.is_empty() {
                        self.handle_line(&rest);
                    }
                    self.finished = true;
                    if let Some(event) = self.pending.pop_front() {
                        return Some(Ok(event));
                    }
                    return None;
                }
            }
        }
    }
}
