//! Security settings model - the persisted per-account two-factor record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorMethod {
    #[default]
    Email,
}

impl TwoFactorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwoFactorMethod::Email => "email",
        }
    }
}

/// Persisted security settings row (one per account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySettings {
    pub user_id: Uuid,
    pub two_factor_enabled: bool,
    #[serde(default)]
    pub two_factor_method: TwoFactorMethod,
    pub two_factor_verified_at: Option<DateTime<Utc>>,
}

/// Row created lazily on first gate evaluation of a privileged account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSecuritySettings {
    pub user_id: Uuid,
    pub two_factor_enabled: bool,
    pub two_factor_method: TwoFactorMethod,
    pub two_factor_verified_at: Option<DateTime<Utc>>,
}

impl NewSecuritySettings {
    /// A missing row always becomes an enabled one.
    pub fn privileged_default(user_id: Uuid, verified_at: Option<DateTime<Utc>>) -> Self {
        Self {
            user_id,
            two_factor_enabled: true,
            two_factor_method: TwoFactorMethod::Email,
            two_factor_verified_at: verified_at,
        }
    }
}

impl From<NewSecuritySettings> for SecuritySettings {
    fn from(n: NewSecuritySettings) -> Self {
        Self {
            user_id: n.user_id,
            two_factor_enabled: n.two_factor_enabled,
            two_factor_method: n.two_factor_method,
            two_factor_verified_at: n.two_factor_verified_at,
        }
    }
}

/// The only partial update this crate ever sends.
///
/// `two_factor_enabled` belongs to the settings screen and is deliberately
/// absent so a patch can never overwrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettingsPatch {
    pub two_factor_verified_at: DateTime<Utc>,
}

impl SettingsPatch {
    pub fn verified_at(at: DateTime<Utc>) -> Self {
        Self {
            two_factor_verified_at: at,
        }
    }

    pub fn apply(&self, settings: &mut SecuritySettings) {
        settings.two_factor_verified_at = Some(self.two_factor_verified_at);
    }
}
