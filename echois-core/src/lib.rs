pub mod chat;
pub mod error;
pub mod prompt;
pub mod usage;

pub use chat::{parse_history, ChatMessage, MessageRole};
pub use error::{Error, Result};
pub use prompt::system_message;
pub use usage::UsageRecord;
