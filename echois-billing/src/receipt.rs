//! Legacy `verifyReceipt` flow for app-initiated subscription refreshes.

use crate::error::{BillingError, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const PRODUCTION_VERIFY_URL: &str = "https://buy.itunes.apple.com/verifyReceipt";
pub const SANDBOX_VERIFY_URL: &str = "https://sandbox.itunes.apple.com/verifyReceipt";

#[derive(Debug, Clone)]
pub struct ReceiptOutcome {
    pub active: bool,
    /// Epoch milliseconds from the latest receipt info, when present.
    pub expires_date: Option<i64>,
    /// Lets the caller link the user to later webhook notifications for
    /// the same subscription.
    pub original_transaction_id: Option<String>,
    pub raw: Value,
}

pub struct ReceiptVerifier {
    client: reqwest::Client,
    verify_url: String,
    shared_secret: String,
}

impl ReceiptVerifier {
    pub fn new(verify_url: impl Into<String>, shared_secret: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            verify_url: verify_url.into(),
            shared_secret: shared_secret.into(),
        })
    }

    /// Send base64 receipt data to Apple and interpret the result. Status 0
    /// means the receipt decoded and the subscription is current.
    pub async fn verify(&self, receipt_data: &str) -> Result<ReceiptOutcome> {
        let body = json!({
            "receipt-data": receipt_data,
            "password": self.shared_secret,
        });

        let response = self.client.post(&self.verify_url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(BillingError::Receipt(format!(
                "verifyReceipt returned {}",
                response.status()
            )));
        }

        let raw: Value = response.json().await?;
        let status = raw.get("status").and_then(Value::as_i64);
        debug!("verifyReceipt status: {:?}", status);

        let active = status == Some(0);
        let expires_date = if active {
            raw.pointer("/latest_receipt_info/0/expires_date_ms")
                .and_then(Value::as_str)
                .and_then(|ms| ms.parse::<i64>().ok())
        } else {
            None
        };
        let original_transaction_id = raw
            .pointer("/latest_receipt_info/0/original_transaction_id")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        Ok(ReceiptOutcome {
            active,
            expires_date,
            original_transaction_id,
            raw,
        })
    }
}
