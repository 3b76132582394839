use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("No kid in JWS header")]
    MissingKeyId,

    #[error("Key fetch failed: {0}")]
    KeyFetch(String),

    #[error("JWS verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Receipt verification failed: {0}")]
    Receipt(String),

    #[error("Notification carries no originalTransactionId")]
    MissingTransactionId,
}

pub type Result<T> = std::result::Result<T, BillingError>;
