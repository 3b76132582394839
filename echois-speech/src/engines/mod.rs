//! TTS engine implementations

pub mod openai;

use crate::config::VoiceConfig;
use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Synthesize one sentence of text to audio bytes.
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Bytes, SpeechError>;

    /// Get engine name
    fn name(&self) -> &str;
}
