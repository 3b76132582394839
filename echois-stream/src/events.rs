//! Channel events and their SSE wire framing.

use serde_json::json;

/// A discriminated message on the outbound push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One completed sentence; `audio` is base64 and absent when synthesis
    /// failed for this sentence.
    Message {
        text: String,
        audio: Option<String>,
    },
    /// Terminal fault description.
    Error { error: String },
    /// Terminal success when the upstream sent its explicit sentinel.
    DoneText,
    /// Terminal success when the upstream ended without a sentinel.
    End,
}

impl ChannelEvent {
    pub fn message(text: impl Into<String>, audio: Option<String>) -> Self {
        ChannelEvent::Message {
            text: text.into(),
            audio,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ChannelEvent::Error {
            error: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChannelEvent::Message { .. })
    }

    /// Render the blank-line-terminated SSE frame for this event.
    pub fn to_frame(&self) -> String {
        match self {
            ChannelEvent::Message { text, audio } => {
                let mut data = json!({ "text": text });
                if let Some(audio) = audio {
                    data["audio"] = json!(audio);
                }
                format!("event: message\ndata: {}\n\n", data)
            }
            ChannelEvent::Error { error } => {
                format!("event: error\ndata: {}\n\n", json!({ "error": error }))
            }
            // The sentinel-completion frame intentionally carries no event
            // name; clients match on the DONE text.
            ChannelEvent::DoneText => format!("data: {}\n\n", json!({ "text": "DONE" })),
            ChannelEvent::End => format!("event: end\ndata: {}\n\n", json!({ "done": true })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_frame_with_audio() {
        let frame = ChannelEvent::message("Hi.", Some("QUJD".to_string())).to_frame();
        assert_eq!(
            frame,
            "event: message\ndata: {\"audio\":\"QUJD\",\"text\":\"Hi.\"}\n\n"
        );
    }

    #[test]
    fn test_message_frame_without_audio() {
        let frame = ChannelEvent::message("Hi.", None).to_frame();
        assert_eq!(frame, "event: message\ndata: {\"text\":\"Hi.\"}\n\n");
        assert!(!frame.contains("audio"));
    }

    #[test]
    fn test_error_frame() {
        let frame = ChannelEvent::error("boom").to_frame();
        assert_eq!(frame, "event: error\ndata: {\"error\":\"boom\"}\n\n");
    }

    #[test]
    fn test_done_text_frame_has_no_event_name() {
        let frame = ChannelEvent::DoneText.to_frame();
        assert_eq!(frame, "data: {\"text\":\"DONE\"}\n\n");
    }

    #[test]
    fn test_end_frame() {
        let frame = ChannelEvent::End.to_frame();
        assert_eq!(frame, "event: end\ndata: {\"done\":true}\n\n");
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!ChannelEvent::message("x", None).is_terminal());
        assert!(ChannelEvent::error("x").is_terminal());
        assert!(ChannelEvent::DoneText.is_terminal());
        assert!(ChannelEvent::End.is_terminal());
    }
}
