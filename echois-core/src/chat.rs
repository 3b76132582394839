//! Chat message types shared by the provider layer and the HTTP surface.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Parse a message history arriving as a query parameter.
///
/// Clients send the history URI-encoded, so the raw value is decoded before
/// being parsed as a JSON array of `{role, content}` objects. An empty or
/// undecodable value is a validation error, never a panic.
pub fn parse_history(raw: &str) -> Result<Vec<ChatMessage>> {
    if raw.trim().is_empty() {
        return Err(Error::Validation("No messages provided".to_string()));
    }

    let decoded = urlencoding::decode(raw)
        .map_err(|e| Error::Validation(format!("Messages are not valid UTF-8: {}", e)))?;

    let messages: Vec<ChatMessage> = serde_json::from_str(&decoded)
        .map_err(|e| Error::Validation(format!("Invalid messages format: {}", e)))?;

    if messages.is_empty() {
        return Err(Error::Validation("No messages provided".to_string()));
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: MessageRole = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, MessageRole::System);
    }

    #[test]
    fn test_parse_history_plain_json() {
        let raw = r#"[{"role":"user","content":"Hello"}]"#;
        let messages = parse_history(raw).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "Hello");
    }

    #[test]
    fn test_parse_history_uri_encoded() {
        let raw = "%5B%7B%22role%22%3A%22user%22%2C%22content%22%3A%22Hi%20there%22%7D%5D";
        let messages = parse_history(raw).unwrap();
        assert_eq!(messages[0].content, "Hi there");
    }

    #[test]
    fn test_parse_history_rejects_empty() {
        assert!(parse_history("").is_err());
        assert!(parse_history("  ").is_err());
        assert!(parse_history("%5B%5D").is_err());
    }

    #[test]
    fn test_parse_history_rejects_malformed() {
        assert!(parse_history("not json").is_err());
        assert!(parse_history(r#"{"role":"user"}"#).is_err());
    }
}
