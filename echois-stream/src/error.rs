use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Push channel closed by client")]
    ChannelClosed,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
