//! Cache of Apple's JWS signing keys.
//!
//! Keys are fetched per `kid` from the App Store Server API and held in
//! memory with a TTL. Verification failures invalidate the cached key so the
//! next lookup refetches, which covers Apple rotating a key mid-TTL.

use crate::clock::Clock;
use crate::error::{BillingError, Result};
use dashmap::DashMap;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const APPLE_KEYS_BASE_URL: &str = "https://api.storekit.itunes.apple.com";
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(12 * 60 * 60);

struct CachedKey {
    jwk: Jwk,
    fetched_at_ms: i64,
}

pub struct AppleKeyCache {
    base_url: String,
    ttl_ms: i64,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    entries: DashMap<String, CachedKey>,
}

impl AppleKeyCache {
    pub fn new(base_url: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_url: base_url.into(),
            ttl_ms: ttl.as_millis() as i64,
            client: reqwest::Client::new(),
            clock,
            entries: DashMap::new(),
        }
    }

    /// Return the public key for `kid`, fetching from Apple on a cache miss
    /// or an expired entry.
    pub async fn get(&self, kid: &str) -> Result<Jwk> {
        let now = self.clock.now_ms();
        if let Some(entry) = self.entries.get(kid) {
            if now - entry.fetched_at_ms < self.ttl_ms {
                return Ok(entry.jwk.clone());
            }
        }

        let url = format!("{}/inApps/v1/keys/{}", self.base_url, kid);
        debug!("Fetching Apple signing key: kid={}", kid);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BillingError::KeyFetch(format!(
                "kid={}, status={}",
                kid,
                response.status()
            )));
        }

        let key_set: JwkSet = response.json().await?;
        let jwk = key_set
            .find(kid)
            .cloned()
            .ok_or_else(|| BillingError::KeyFetch(format!("no matching key for kid={}", kid)))?;

        self.entries.insert(
            kid.to_string(),
            CachedKey {
                jwk: jwk.clone(),
                fetched_at_ms: now,
            },
        );
        Ok(jwk)
    }

    pub fn invalidate(&self, kid: &str) {
        self.entries.remove(kid);
    }
}
