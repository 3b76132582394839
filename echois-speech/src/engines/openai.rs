//! API-based TTS engine over the OpenAI speech endpoint.

use crate::config::{TtsConfig, VoiceConfig};
use crate::engines::TtsEngine;
use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub struct OpenAiTtsEngine {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiTtsEngine {
    pub fn new(config: TtsConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SpeechError::Engine(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
        })
    }

    fn api_key(&self) -> Result<String, SpeechError> {
        if let Some(ref key) = self.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| SpeechError::Engine("OpenAI API key not provided".to_string()))
    }
}

#[async_trait]
impl TtsEngine for OpenAiTtsEngine {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Bytes, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::Engine("Text cannot be empty".to_string()));
        }

        let api_key = self.api_key()?;
        let request_body = json!({
            "model": self.model,
            "input": text,
            "voice": voice.name,
            "response_format": "mp3",
            "speed": voice.speed.clamp(0.25, 4.0),
        });

        let url = format!("{}/v1/audio/speech", self.endpoint);
        debug!("Synthesizing {} chars with voice {}", text.len(), voice.name);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api(format!("HTTP {}: {}", status, text)));
        }

        Ok(response.bytes().await?)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
