//! Server configuration assembled from environment variables.

use echois_billing::{PRODUCTION_VERIFY_URL, SANDBOX_VERIFY_URL};
use echois_llm::LlmConfig;
use echois_speech::{SttConfig, TtsConfig, VoiceConfig};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub stt: SttConfig,
    pub voice: VoiceConfig,
    /// Bound on the wait for upstream chat chunks during streaming.
    pub stream_idle_timeout: Option<Duration>,
    pub apple_verify_url: String,
    pub apple_shared_secret: String,
    /// Where to POST usage records. Unset disables usage reporting.
    pub usage_endpoint: Option<String>,
}

impl ServerConfig {
    pub fn from_env(port: u16) -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok();

        let mut llm = LlmConfig {
            api_key: api_key.clone(),
            ..LlmConfig::default()
        };
        if let Ok(model) = std::env::var("ECHOIS_CHAT_MODEL") {
            llm.default_model = model;
        }

        let tts = TtsConfig {
            api_key: api_key.clone(),
            ..TtsConfig::default()
        };
        let stt = SttConfig {
            api_key,
            ..SttConfig::default()
        };

        let mut voice = VoiceConfig::default();
        if let Ok(name) = std::env::var("ECHOIS_TTS_VOICE") {
            voice.name = name;
        }

        let stream_idle_timeout = std::env::var("ECHOIS_STREAM_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let apple_verify_url = if std::env::var("ECHOIS_ENV").as_deref() == Ok("production") {
            PRODUCTION_VERIFY_URL.to_string()
        } else {
            SANDBOX_VERIFY_URL.to_string()
        };

        Self {
            port,
            llm,
            tts,
            stt,
            voice,
            stream_idle_timeout,
            apple_verify_url,
            apple_shared_secret: std::env::var("APPLE_SHARED_SECRET").unwrap_or_default(),
            usage_endpoint: std::env::var("ECHOIS_USAGE_ENDPOINT").ok(),
        }
    }
}
