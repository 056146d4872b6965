//! Shared setup for step-up gate integration tests.
//!
//! Builds a gate over in-memory collaborators with a clock the test controls.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use stepup_gate::{
    models::{Account, PrivilegeSet, Role, SecuritySettings, TrustRecord, TwoFactorMethod},
    services::{Clock, InMemorySettingsStore, ManualClock, MemorySessionStorage, MockOtpService, SessionStorage},
    StepUpConfig, StepUpGate, StepUpRuntime,
};
use uuid::Uuid;

pub const VALID_CODE: &str = "123456";

pub struct TestHarness {
    pub config: StepUpConfig,
    pub settings: Arc<InMemorySettingsStore>,
    pub storage: Arc<MemorySessionStorage>,
    pub clock: Arc<ManualClock>,
    pub otp: Arc<MockOtpService>,
    pub gate: StepUpGate,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: StepUpConfig) -> Self {
        let settings = Arc::new(InMemorySettingsStore::new());
        let storage = Arc::new(MemorySessionStorage::new());
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let otp = Arc::new(MockOtpService::new(VALID_CODE));
        let gate = StepUpGate::new(settings.clone(), storage.clone(), clock.clone(), &config);

        Self {
            config,
            settings,
            storage,
            clock,
            otp,
            gate,
        }
    }

    pub fn runtime(&self) -> StepUpRuntime {
        StepUpRuntime::with_services(
            self.config.clone(),
            self.settings.clone(),
            self.otp.clone(),
            self.storage.clone(),
            self.clock.clone(),
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Account whose creation lies `age` before the harness clock.
    pub fn account_aged(&self, age: Duration) -> Account {
        Account::new(Uuid::new_v4(), "coach@example.com", self.now() - age)
    }

    /// Account well outside the signup grace window.
    pub fn established_account(&self) -> Account {
        self.account_aged(Duration::days(30))
    }

    pub fn insert_row(&self, user_id: Uuid, enabled: bool, verified_at: Option<DateTime<Utc>>) {
        self.settings.insert(settings_row(user_id, enabled, verified_at));
    }

    /// Seed the session trust record directly, as a previous page load would have.
    pub fn seed_trust(&self, user_id: Uuid, verified_at: DateTime<Utc>) {
        let raw = serde_json::to_string(&TrustRecord::new(user_id, verified_at)).unwrap();
        self.storage.set_item(&self.config.session_key, &raw).unwrap();
    }

    pub fn raw_trust(&self) -> Option<String> {
        self.storage.get_item(&self.config.session_key).unwrap()
    }

    pub fn stored_trust(&self) -> Option<TrustRecord> {
        self.raw_trust()
            .map(|raw| serde_json::from_str(&raw).expect("trust record should be valid JSON"))
    }
}

pub fn test_config() -> StepUpConfig {
    let mut config = StepUpConfig::default();
    config.log_level = "error".to_string();
    config.persist_retry.initial_backoff_ms = 1;
    config
}

/// Millisecond-aligned so it survives the epoch-millis trust record.
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_760_000_000_000).unwrap()
}

pub fn privileged() -> PrivilegeSet {
    PrivilegeSet::from_roles([Role::Coach])
}

pub fn unprivileged() -> PrivilegeSet {
    PrivilegeSet::from_roles([Role::Member])
}

pub fn settings_row(user_id: Uuid, enabled: bool, verified_at: Option<DateTime<Utc>>) -> SecuritySettings {
    SecuritySettings {
        user_id,
        two_factor_enabled: enabled,
        two_factor_method: TwoFactorMethod::Email,
        two_factor_verified_at: verified_at,
    }
}
