//! In-memory subscription state.
//!
//! Webhook notifications are keyed by `originalTransactionId`; receipt
//! refreshes initiated by the app are keyed by user. `link_user` ties a user
//! to a transaction so status lookups can resolve webhook-sourced records.

use crate::clock::Clock;
use crate::error::{BillingError, Result};
use crate::verify::{AppleRenewalPayload, AppleTransactionPayload};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Free,
    Active,
    Expired,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_renew_status: Option<i64>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub updated_at: i64,
}

pub struct SubscriptionStore {
    clock: Arc<dyn Clock>,
    by_transaction: DashMap<String, SubscriptionRecord>,
    user_records: DashMap<String, SubscriptionRecord>,
    user_links: DashMap<String, String>,
}

impl SubscriptionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            by_transaction: DashMap::new(),
            user_records: DashMap::new(),
            user_links: DashMap::new(),
        }
    }

    /// Upsert from a verified server notification. Returns the
    /// `originalTransactionId` the record was stored under.
    pub fn apply_notification(
        &self,
        notification_type: Option<String>,
        subtype: Option<String>,
        transaction: Option<AppleTransactionPayload>,
        renewal: Option<AppleRenewalPayload>,
    ) -> Result<String> {
        let transaction_id = transaction
            .as_ref()
            .and_then(|t| t.original_transaction_id.clone())
            .or_else(|| {
                renewal
                    .as_ref()
                    .and_then(|r| r.original_transaction_id.clone())
            })
            .ok_or(BillingError::MissingTransactionId)?;

        let now = self.clock.now_ms();
        let expires_date = transaction.as_ref().and_then(|t| t.expires_date);
        let record = SubscriptionRecord {
            original_transaction_id: Some(transaction_id.clone()),
            product_id: transaction.as_ref().and_then(|t| t.product_id.clone()),
            environment: transaction
                .as_ref()
                .and_then(|t| t.environment.clone())
                .or_else(|| renewal.as_ref().and_then(|r| r.environment.clone())),
            expires_date,
            auto_renew_status: renewal.as_ref().and_then(|r| r.auto_renew_status),
            is_active: expires_date.is_some_and(|ms| ms > now),
            notification_type,
            subtype,
            updated_at: now,
        };

        info!(
            "Subscription updated from notification: transaction={}, active={}",
            transaction_id, record.is_active
        );
        self.by_transaction.insert(transaction_id.clone(), record);
        Ok(transaction_id)
    }

    /// Upsert from an app-initiated receipt refresh, keyed by user.
    pub fn apply_receipt(&self, user_id: &str, active: bool, expires_date: Option<i64>) {
        let now = self.clock.now_ms();
        self.user_records.insert(
            user_id.to_string(),
            SubscriptionRecord {
                expires_date,
                is_active: active,
                updated_at: now,
                ..SubscriptionRecord::default()
            },
        );
    }

    /// Associate a user with an `originalTransactionId` seen in a webhook.
    pub fn link_user(&self, user_id: &str, transaction_id: &str) {
        self.user_links
            .insert(user_id.to_string(), transaction_id.to_string());
    }

    /// Resolve the subscription status for a user. No record at all means
    /// the user is on the free tier; a record past its expiry is expired.
    pub fn status_for_user(
        &self,
        user_id: &str,
    ) -> (SubscriptionStatus, Option<SubscriptionRecord>) {
        let record = self
            .user_links
            .get(user_id)
            .and_then(|link| self.by_transaction.get(link.value()).map(|r| r.clone()))
            .or_else(|| self.user_records.get(user_id).map(|r| r.clone()));

        match record {
            None => (SubscriptionStatus::Free, None),
            Some(record) => {
                let now = self.clock.now_ms();
                let status = if record.expires_date.is_some_and(|ms| ms > now) {
                    SubscriptionStatus::Active
                } else {
                    SubscriptionStatus::Expired
                };
                (status, Some(record))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct ManualClock(AtomicI64);

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn store_at(now_ms: i64) -> (SubscriptionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock(AtomicI64::new(now_ms)));
        (SubscriptionStore::new(clock.clone()), clock)
    }

    fn transaction(id: &str, expires: i64) -> AppleTransactionPayload {
        AppleTransactionPayload {
            original_transaction_id: Some(id.to_string()),
            product_id: Some("premium.monthly".to_string()),
            expires_date: Some(expires),
            ..AppleTransactionPayload::default()
        }
    }

    #[test]
    fn test_unknown_user_is_free() {
        let (store, _) = store_at(0);
        let (status, record) = store.status_for_user("u1");
        assert_eq!(status, SubscriptionStatus::Free);
        assert!(record.is_none());
    }

    #[test]
    fn test_notification_then_link_resolves_active() {
        let (store, _) = store_at(1_000);
        let tx_id = store
            .apply_notification(
                Some("DID_RENEW".to_string()),
                None,
                Some(transaction("tx-1", 5_000)),
                None,
            )
            .unwrap();
        store.link_user("u1", &tx_id);

        let (status, record) = store.status_for_user("u1");
        assert_eq!(status, SubscriptionStatus::Active);
        assert_eq!(
            record.unwrap().product_id.as_deref(),
            Some("premium.monthly")
        );
    }

    #[test]
    fn test_subscription_expires_as_time_advances() {
        let (store, clock) = store_at(1_000);
        let tx_id = store
            .apply_notification(None, None, Some(transaction("tx-1", 5_000)), None)
            .unwrap();
        store.link_user("u1", &tx_id);

        assert_eq!(store.status_for_user("u1").0, SubscriptionStatus::Active);
        clock.0.store(5_001, Ordering::SeqCst);
        assert_eq!(store.status_for_user("u1").0, SubscriptionStatus::Expired);
    }

    #[test]
    fn test_notification_without_transaction_id_rejected() {
        let (store, _) = store_at(0);
        let err = store
            .apply_notification(None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, BillingError::MissingTransactionId));
    }

    #[test]
    fn test_renewal_only_notification_uses_its_transaction_id() {
        let (store, _) = store_at(0);
        let renewal = AppleRenewalPayload {
            original_transaction_id: Some("tx-2".to_string()),
            auto_renew_status: Some(0),
            ..AppleRenewalPayload::default()
        };
        let tx_id = store
            .apply_notification(Some("DID_CHANGE_RENEWAL_STATUS".to_string()), None, None, Some(renewal))
            .unwrap();
        assert_eq!(tx_id, "tx-2");
        store.link_user("u1", &tx_id);
        // No expiresDate on the record means not active.
        assert_eq!(store.status_for_user("u1").0, SubscriptionStatus::Expired);
    }

    #[test]
    fn test_receipt_refresh_keyed_by_user() {
        let (store, _) = store_at(1_000);
        store.apply_receipt("u1", true, Some(9_000));
        let (status, record) = store.status_for_user("u1");
        assert_eq!(status, SubscriptionStatus::Active);
        assert!(record.unwrap().is_active);
    }
}
