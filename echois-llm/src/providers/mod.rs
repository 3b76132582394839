pub mod openai;

use crate::config::{ChatRequest, ChatResponse};
use crate::error::Result;
use crate::streaming::TokenSource;
use async_trait::async_trait;

/// Chat completion provider abstraction.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-shot completion, used by the structured extraction endpoints.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Streaming completion, yielding incremental content deltas.
    async fn chat_stream(&self, request: ChatRequest) -> Result<Box<dyn TokenSource>>;
}
