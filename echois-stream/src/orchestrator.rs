//! End-to-end lifecycle of one streaming request.
//!
//! State machine: `AwaitingUpstream → Streaming → Draining → Terminated`.
//! Reading and draining are interleaved steps of one control loop, never two
//! concurrent tasks: the queue is drained to empty after every delta, which
//! serializes synthesis calls and makes output order match arrival order
//! without a lock.

use crate::error::StreamError;
use crate::events::ChannelEvent;
use crate::segment::{split_sentences, DEFAULT_TERMINATORS};
use crate::sink::EventSink;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use echois_llm::{LlmError, StreamEvent, TokenSource};
use echois_speech::{TtsEngine, VoiceConfig};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub terminators: Vec<char>,
    pub voice: VoiceConfig,
    /// Bound on the wait for the next upstream chunk. `None` disables the
    /// timeout; a hung upstream then hangs the request.
    pub idle_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            terminators: DEFAULT_TERMINATORS.to_vec(),
            voice: VoiceConfig::default(),
            idle_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    AwaitingUpstream,
    Streaming,
    Draining,
    Terminated,
}

/// What a finished request produced, for usage attribution.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOutcome {
    pub sentences: usize,
    pub chars: usize,
}

pub struct StreamOrchestrator {
    synth: Arc<dyn TtsEngine>,
    sink: EventSink,
    config: PipelineConfig,
    request_id: Uuid,
    state: StreamState,
    buffer: String,
    queue: VecDeque<String>,
    outcome: StreamOutcome,
}

impl StreamOrchestrator {
    pub fn new(synth: Arc<dyn TtsEngine>, sink: EventSink, config: PipelineConfig) -> Self {
        Self {
            synth,
            sink,
            config,
            request_id: Uuid::new_v4(),
            state: StreamState::AwaitingUpstream,
            buffer: String::new(),
            queue: VecDeque::new(),
            outcome: StreamOutcome::default(),
        }
    }

    /// Drive the request to completion. Consumes the orchestrator; dropping
    /// it closes the push channel, so the terminal frame is always the last
    /// thing the client sees.
    pub async fn run<T: TokenSource>(
        mut self,
        upstream: Result<T, LlmError>,
    ) -> StreamOutcome {
        let mut source = match upstream {
            Ok(source) => source,
            Err(e) => {
                error!("[{}] Upstream connection failed: {}", self.request_id, e);
                self.terminate(ChannelEvent::error("Chat completion API error"))
                    .await;
                return self.outcome;
            }
        };
        self.state = StreamState::Streaming;
        debug!("[{}] Upstream connected, streaming", self.request_id);

        loop {
            let next = match self.config.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, source.next_event()).await {
                    Ok(item) => item,
                    Err(_) => {
                        warn!(
                            "[{}] Upstream idle for {:?}, aborting",
                            self.request_id, limit
                        );
                        self.terminate(ChannelEvent::error("Upstream stream timed out"))
                            .await;
                        return self.outcome;
                    }
                },
                None => source.next_event().await,
            };

            match next {
                Some(Ok(StreamEvent::Delta(text))) => {
                    self.buffer.push_str(&text);
                    let split = split_sentences(&self.buffer, &self.config.terminators);
                    self.buffer = split.remainder;
                    self.queue.extend(split.sentences);
                    if self.drain_queue().await.is_err() {
                        // Client went away; stop reading, nothing more to write.
                        self.state = StreamState::Terminated;
                        return self.outcome;
                    }
                }
                Some(Ok(StreamEvent::Done)) => {
                    self.finish(ChannelEvent::DoneText).await;
                    return self.outcome;
                }
                Some(Err(e)) => {
                    error!("[{}] Upstream stream error: {}", self.request_id, e);
                    self.terminate(ChannelEvent::error("Chat completion stream error"))
                        .await;
                    return self.outcome;
                }
                None => {
                    self.finish(ChannelEvent::End).await;
                    return self.outcome;
                }
            }
        }
    }

    /// Flush the buffered remainder, drain the queue, emit the terminal
    /// frame. Entered exactly once per request that reached `Streaming`.
    async fn finish(&mut self, terminal: ChannelEvent) {
        self.state = StreamState::Draining;
        let rest = self.buffer.trim().to_string();
        self.buffer.clear();
        if !rest.is_empty() {
            self.queue.push_back(rest);
        }
        if self.drain_queue().await.is_err() {
            self.state = StreamState::Terminated;
            return;
        }
        self.terminate(terminal).await;
        info!(
            "[{}] Stream complete: {} sentences, {} chars",
            self.request_id, self.outcome.sentences, self.outcome.chars
        );
    }

    /// Emit the terminal event and seal the state machine. No reads,
    /// synthesis calls, or writes happen after this.
    async fn terminate(&mut self, terminal: ChannelEvent) {
        if self.state == StreamState::Terminated {
            return;
        }
        if self.sink.emit(&terminal).await.is_err() {
            debug!(
                "[{}] Client disconnected before terminal event",
                self.request_id
            );
        }
        self.state = StreamState::Terminated;
    }

    /// Pop the sentence queue in FIFO order, synthesizing then emitting one
    /// sentence at a time. Synthesis failure is recoverable: the sentence
    /// still goes out, text-only.
    async fn drain_queue(&mut self) -> Result<(), StreamError> {
        while let Some(sentence) = self.queue.pop_front() {
            let audio = match self.synth.synthesize(&sentence, &self.config.voice).await {
                Ok(bytes) => Some(BASE64.encode(&bytes)),
                Err(e) => {
                    warn!(
                        "[{}] TTS failed, delivering text only: {}",
                        self.request_id, e
                    );
                    None
                }
            };
            self.outcome.sentences += 1;
            self.outcome.chars += sentence.chars().count();
            self.sink
                .emit(&ChannelEvent::message(sentence, audio))
                .await?;
        }
        Ok(())
    }
}
