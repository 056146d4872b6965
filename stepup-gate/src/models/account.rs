//! Account model - identity-provider owned, read-only here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: Uuid,
    pub email: String,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    pub fn new(user_id: Uuid, email: impl Into<String>, created_utc: DateTime<Utc>) -> Self {
        Self {
            user_id,
            email: email.into(),
            created_utc,
        }
    }
}
