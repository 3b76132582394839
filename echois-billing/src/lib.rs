//! App Store subscription handling.
//!
//! Server notifications arrive as Apple-signed JWS strings; this crate
//! verifies them against cached signing keys, folds them into an in-memory
//! subscription store, and exposes the legacy receipt verification and
//! usage reporting flows the mobile client depends on.

pub mod clock;
pub mod error;
pub mod keys;
pub mod receipt;
pub mod store;
pub mod usage;
pub mod verify;

pub use clock::{Clock, SystemClock};
pub use error::{BillingError, Result};
pub use keys::{AppleKeyCache, APPLE_KEYS_BASE_URL, DEFAULT_KEY_TTL};
pub use receipt::{ReceiptOutcome, ReceiptVerifier, PRODUCTION_VERIFY_URL, SANDBOX_VERIFY_URL};
pub use store::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};
pub use usage::UsageSink;
pub use verify::{
    AppleJwsVerifier, AppleNotification, AppleRenewalPayload, AppleTransactionPayload,
    NotificationData,
};
