//! App Store Server Notification decoding and JWS verification.

use crate::error::{BillingError, Result};
use crate::keys::AppleKeyCache;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

const APPLE_ISSUER: &str = "appstoreconnect.apple.com";

/// Body of a version 2 App Store Server Notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleNotification {
    pub notification_type: Option<String>,
    pub subtype: Option<String>,
    pub data: NotificationData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub signed_transaction_info: Option<String>,
    pub signed_renewal_info: Option<String>,
}

/// Decoded `signedTransactionInfo` claims. Dates are epoch milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppleTransactionPayload {
    pub original_transaction_id: Option<String>,
    pub product_id: Option<String>,
    pub environment: Option<String>,
    pub expires_date: Option<i64>,
    pub purchase_date: Option<i64>,
}

/// Decoded `signedRenewalInfo` claims. `auto_renew_status` is 1 for on,
/// 0 for off.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppleRenewalPayload {
    pub auto_renew_product_id: Option<String>,
    pub auto_renew_status: Option<i64>,
    pub original_transaction_id: Option<String>,
    pub environment: Option<String>,
}

/// Verifies Apple-signed JWS strings against the cached signing keys.
pub struct AppleJwsVerifier {
    keys: AppleKeyCache,
}

impl AppleJwsVerifier {
    pub fn new(keys: AppleKeyCache) -> Self {
        Self { keys }
    }

    /// Verify `jws` and deserialize its claims.
    ///
    /// A failed verification invalidates the cached key and retries exactly
    /// once with a freshly fetched key, in case Apple rotated it while the
    /// cache entry was still live.
    pub async fn verify<T: DeserializeOwned>(&self, jws: &str) -> Result<T> {
        let header = decode_header(jws)?;
        let kid = header.kid.ok_or(BillingError::MissingKeyId)?;

        match self.attempt::<T>(jws, &kid, header.alg).await {
            Ok(payload) => Ok(payload),
            Err(first) => {
                warn!(
                    "JWS verification failed, refetching key and retrying: kid={}, error={}",
                    kid, first
                );
                self.keys.invalidate(&kid);
                self.attempt::<T>(jws, &kid, header.alg).await
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        jws: &str,
        kid: &str,
        alg: Algorithm,
    ) -> Result<T> {
        let jwk = self.keys.get(kid).await?;
        let key = DecodingKey::from_jwk(&jwk)?;

        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.set_issuer(&[APPLE_ISSUER]);

        let data = decode::<T>(jws, &key, &validation)?;
        Ok(data.claims)
    }
}
