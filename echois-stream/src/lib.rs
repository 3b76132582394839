//! The real-time conversational speech pipeline.
//!
//! One task per client request: token deltas from the chat model are
//! segmented into sentences as they arrive, each completed sentence is
//! synthesized to audio, and ordered (text, audio) pairs are pushed to the
//! client over a server-sent-event channel.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod segment;
pub mod sink;

pub use error::StreamError;
pub use events::ChannelEvent;
pub use orchestrator::{PipelineConfig, StreamOrchestrator, StreamOutcome, StreamState};
pub use segment::{split_sentences, SentenceSplit, DEFAULT_TERMINATORS};
pub use sink::EventSink;
