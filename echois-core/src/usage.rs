//! Usage attribution payloads sent to the accounting collaborator.

use serde::{Deserialize, Serialize};

/// A fire-and-forget usage signal. Either `seconds` (speech endpoints) or
/// `tokens` (text endpoints) is set, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
}

impl UsageRecord {
    pub fn seconds(user_id: impl Into<String>, seconds: u32) -> Self {
        Self {
            user_id: user_id.into(),
            seconds: Some(seconds),
            tokens: None,
        }
    }

    pub fn tokens(user_id: impl Into<String>, tokens: u32) -> Self {
        Self {
            user_id: user_id.into(),
            seconds: None,
            tokens: Some(tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_record_wire_shape() {
        let rec = UsageRecord::seconds("u1", 42);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["seconds"], 42);
        assert!(json.get("tokens").is_none());
    }
}
