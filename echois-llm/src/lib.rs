pub mod config;
pub mod error;
pub mod providers;
pub mod streaming;

pub use config::*;
pub use error::{LlmError, Result};
pub use providers::openai::OpenAiProvider;
pub use providers::ChatProvider;
pub use streaming::{SseTokenStream, StreamEvent, TokenSource};
