//! Session-local trust cache.
//!
//! Never authoritative: a hit saves a round trip to the settings store, a
//! miss falls through to it. Writes are crate-private so only the gate can
//! put a record here.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::policy::TrustWindowPolicy;
use crate::models::TrustRecord;
use crate::services::{ServiceError, SessionStorage};

#[derive(Clone)]
pub struct LocalTrustCache {
    storage: Arc<dyn SessionStorage>,
    key: String,
}

impl LocalTrustCache {
    pub fn new(storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The stored record, if present and readable.
    ///
    /// An unparsable value is removed and reported as absent.
    pub fn record(&self) -> Option<TrustRecord> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "Session storage unreadable, treating as miss");
                return None;
            }
        };

        let parsed = serde_json::from_str::<TrustRecord>(&raw)
            .ok()
            .filter(|record| record.verified_at().is_some());

        if parsed.is_none() {
            tracing::debug!(key = %self.key, "Discarding corrupt trust record");
            if let Err(e) = self.storage.remove_item(&self.key) {
                tracing::debug!(error = %e, "Failed to remove corrupt trust record");
            }
        }
        parsed
    }

    /// Verification time for `user_id` if the record is theirs and still
    /// inside the trust window.
    pub fn trusted_at(
        &self,
        user_id: Uuid,
        policy: &TrustWindowPolicy,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let record = self.record()?;
        if !record.belongs_to(user_id) {
            return None;
        }
        let verified_at = record.verified_at()?;
        policy.is_trusted(verified_at, now).then_some(verified_at)
    }

    pub(crate) fn store(&self, user_id: Uuid, verified_at: DateTime<Utc>) -> Result<(), ServiceError> {
        let record = TrustRecord::new(user_id, verified_at);
        let raw = serde_json::to_string(&record)
            .map_err(|e| ServiceError::Storage(format!("cannot encode trust record: {}", e)))?;
        self.storage.set_item(&self.key, &raw)
    }

    pub(crate) fn clear(&self) -> Result<(), ServiceError> {
        self.storage.remove_item(&self.key)
    }
}
