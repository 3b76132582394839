pub mod audio;
pub mod config;
pub mod engines;
pub mod error;
pub mod stt;

pub use config::{SttConfig, TtsConfig, VoiceConfig};
pub use engines::openai::OpenAiTtsEngine;
pub use engines::TtsEngine;
pub use error::SpeechError;
pub use stt::{Transcriber, Transcription};
