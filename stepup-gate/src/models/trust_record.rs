//! Trust record - the session-local proof of a recent verification.
//!
//! Stored as JSON `{"timestamp": <epoch millis>, "userId": "<id>"}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRecord {
    pub timestamp: i64,
    pub user_id: String,
}

impl TrustRecord {
    pub fn new(user_id: Uuid, verified_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: verified_at.timestamp_millis(),
            user_id: user_id.to_string(),
        }
    }

    /// `None` when the stored millis are outside chrono's range.
    pub fn verified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn belongs_to(&self, user_id: Uuid) -> bool {
        Uuid::parse_str(&self.user_id).map_or(false, |id| id == user_id)
    }
}
