//! Speech-to-text transcription over the whisper API.

use crate::config::SttConfig;
use crate::error::SpeechError;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    pub text: String,
}

pub struct Transcriber {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl Transcriber {
    pub fn new(config: SttConfig) -> Result<Self, SpeechError> {
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

    /// Transcribe an uploaded audio file. The file is forwarded as-is; the
    /// upstream rejects formats it does not understand.
    pub async fn transcribe(
        &self,
        audio: Bytes,
        file_name: &str,
    ) -> Result<Transcription, SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::Transcription("Empty audio upload".to_string()));
        }

        let api_key = self.api_key()?;
        debug!("Transcribing {} byte upload", audio.len());
        let part = Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| SpeechError::Transcription(format!("Invalid upload: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let url = format!("{}/v1/audio/transcriptions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api(format!("HTTP {}: {}", status, text)));
        }

        Ok(response.json::<Transcription>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcriber_for(url: &str) -> Transcriber {
        Transcriber::new(SttConfig {
            endpoint: url.to_string(),
            api_key: Some("test-key".to_string()),
            ..SttConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_transcribe_returns_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/audio/transcriptions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"hello there"}"#)
            .create_async()
            .await;

        let transcriber = transcriber_for(&server.url());
        let result = transcriber
            .transcribe(Bytes::from_static(b"RIFFxxxx"), "clip.wav")
            .await
            .unwrap();
        assert_eq!(result.text, "hello there");
    }

    #[tokio::test]
    async fn test_transcribe_rejects_empty_upload() {
        let transcriber = transcriber_for("http://127.0.0.1:1");
        let err = transcriber
            .transcribe(Bytes::new(), "clip.wav")
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::Transcription(_)));
    }

    #[tokio::test]
    async fn test_transcribe_api_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/audio/transcriptions")
            .with_status(400)
            .with_body("bad audio")
            .create_async()
            .await;

        let transcriber = transcriber_for(&server.url());
        let err = transcriber
            .transcribe(Bytes::from_static(b"junk"), "clip.wav")
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::Api(_)));
    }
}
