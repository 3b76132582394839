use serde::{Deserialize, Serialize};

/// Configuration for the API-backed TTS engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            api_key: None,
            model: "tts-1".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Per-request voice selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub name: String,
    /// Playback speed, 0.25 to 4.0.
    pub speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            name: "alloy".to_string(),
            speed: 1.0,
        }
    }
}

/// Configuration for the speech-to-text transcriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            timeout_secs: 120,
        }
    }
}
