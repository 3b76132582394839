//! Fire-and-forget usage reporting.

use crate::error::Result;
use echois_core::UsageRecord;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Posts usage records to the accounting endpoint without blocking the
/// request that produced them. A missing endpoint disables reporting.
#[derive(Clone)]
pub struct UsageSink {
    client: reqwest::Client,
    endpoint: Option<Arc<String>>,
}

impl UsageSink {
    pub fn new(endpoint: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.map(Arc::new),
        })
    }

    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: None,
        }
    }

    /// Queue a record for delivery. Failures are logged, never surfaced to
    /// the caller; usage accounting must not break the user-facing request.
    pub fn record(&self, record: UsageRecord) {
        let Some(endpoint) = self.endpoint.clone() else {
            debug!("Usage reporting disabled, dropping record");
            return;
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = Self::send(&client, &endpoint, &record).await {
                warn!("Failed to report usage: {}", e);
            }
        });
    }

    /// Deliver a record and wait for the response.
    pub async fn send(
        client: &reqwest::Client,
        endpoint: &str,
        record: &UsageRecord,
    ) -> Result<()> {
        client
            .post(endpoint)
            .json(record)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
