use crate::config::{ChatRequest, ChatResponse, LlmConfig, Usage};
use crate::error::{LlmError, Result};
use crate::providers::ChatProvider;
use crate::streaming::{SseTokenStream, TokenSource};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub struct OpenAiProvider {
    config: LlmConfig,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LlmError::HttpRequest)?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<String> {
        if let Some(ref key) = self.config.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::MissingApiKey("OpenAI".to_string()))
    }

    fn request_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        // Only allow alphanumeric, dash, underscore, dot in model names.
        let model = request
            .model
            .as_ref()
            .map(|m| {
                let sanitized: String = m
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
                    .take(100)
                    .collect();
                if sanitized.is_empty() {
                    self.config.default_model.clone()
                } else {
                    sanitized
                }
            })
            .unwrap_or_else(|| self.config.default_model.clone());

        let max_tokens = request
            .max_tokens
            .or(self.config.max_tokens)
            .map(|t| t.min(4096));

        let mut body = json!({
            "model": model,
            "messages": request.messages,
            "temperature": request
                .temperature
                .unwrap_or(self.config.temperature)
                .clamp(0.0, 2.0),
            "stream": stream,
        });
        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(ref format) = request.response_format {
            body["response_format"] = format.clone();
        }
        body
    }

    async fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;
        let body = self.request_body(request, stream);
        let url = format!("{}/chat/completions", self.config.base_url);
        debug!("Requesting chat completion (stream={})", stream);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == 429 {
            return Err(LlmError::RateLimit);
        }
        if status == 401 || status == 403 {
            return Err(LlmError::AuthenticationFailed);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Truncate by characters so multibyte bodies cannot split a
            // UTF-8 sequence.
            let snippet: String = text.chars().take(500).collect();
            return Err(LlmError::InvalidResponse(format!(
                "HTTP {}: {}",
                status, snippet
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let response = self.send(&request, false).await?;
        let json: serde_json::Value = response.json().await?;

        let choices = json
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                LlmError::InvalidResponse("Invalid response format: no choices array".to_string())
            })?;
        let choice = choices.first().ok_or_else(|| {
            LlmError::InvalidResponse("No choices in response".to_string())
        })?;

        let content = choice["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage = json.get("usage").and_then(|u| {
            Some(Usage {
                prompt_tokens: u["prompt_tokens"].as_u64()? as u32,
                completion_tokens: u["completion_tokens"].as_u64()? as u32,
                total_tokens: u["total_tokens"].as_u64()? as u32,
            })
        });

        Ok(ChatResponse {
            content,
            model: json["model"]
                .as_str()
                .unwrap_or(&self.config.default_model)
                .to_string(),
            usage,
            finish_reason: choice["finish_reason"].as_str().map(|s| s.to_string()),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<Box<dyn TokenSource>> {
        let response = self.send(&request, true).await?;
        let bytes = response.bytes_stream().map_err(LlmError::from);
        Ok(Box::new(SseTokenStream::new(bytes)))
    }
}
