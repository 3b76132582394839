//! System prompt construction for the conversational endpoint.

use crate::chat::ChatMessage;

/// Build the system message that shapes the assistant's replies.
///
/// Prepended exactly once per request, before the forwarded history. The
/// target language and conversational style come straight from the request
/// parameters; the defaults (`"en"`, empty style) are applied by the caller.
pub fn system_message(lang: &str, style: &str) -> ChatMessage {
    ChatMessage::system(format!(
        "You are a helpful language-learning assistant.\n\
         The user is practicing {lang}.\n\n\
         1) ALWAYS respond in {lang}.\n\
         2) Keep the conversation going by asking deeper questions or exploring \
         the topic further. Since your style is \"{style}\", be sure to \
         incorporate that style.\n\
         3) At the end of every response, ask a question back to the user to \
         encourage them to continue practicing and exploring deeper."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageRole;

    #[test]
    fn test_system_message_mentions_language_and_style() {
        let msg = system_message("ja", "friendly");
        assert_eq!(msg.role, MessageRole::System);
        assert!(msg.content.contains("practicing ja"));
        assert!(msg.content.contains("\"friendly\""));
    }

    #[test]
    fn test_system_message_empty_style() {
        let msg = system_message("en", "");
        assert!(msg.content.contains("ALWAYS respond in en"));
    }
}
