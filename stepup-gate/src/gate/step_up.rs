//! Step-up gate.
//!
//! Decides, once per protected render, whether a privileged account must
//! pass an OTP challenge first. Checks run in a fixed order and stop at the
//! first decision:
//!
//! 1. No account, or no privileged role: nothing to gate.
//! 2. Local trust record for this user, inside the trust window.
//! 3. Persisted settings: missing row, opted out, recent verification,
//!    signup grace.
//!
//! Every failure on the way to a decision fails closed.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use stepup_core::retry::{retry_call, RetryConfig};
use tracing::instrument;
use uuid::Uuid;

use super::policy::{SignupGraceHeuristic, TrustWindowPolicy};
use super::trust_cache::LocalTrustCache;
use crate::config::StepUpConfig;
use crate::models::{Account, NewSecuritySettings, PrivilegeSet, SecuritySettings, SettingsPatch};
use crate::services::{metrics, Clock, ServiceError, SessionStorage, SettingsStore};

/// Why no challenge is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatisfiedBy {
    NotApplicable,
    LocalTrust,
    PersistedTrust,
    TwoFactorDisabled,
    SignupGrace,
}

/// Why the challenge must be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeReason {
    NeverVerified,
    Expired,
    SettingsUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Satisfied(SatisfiedBy),
    ChallengeRequired(ChallengeReason),
}

impl GateOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, GateOutcome::Satisfied(_))
    }

    pub fn requires_challenge(&self) -> bool {
        matches!(self, GateOutcome::ChallengeRequired(_))
    }

    fn labels(&self) -> (&'static str, &'static str) {
        match self {
            GateOutcome::Satisfied(by) => (
                "satisfied",
                match by {
                    SatisfiedBy::NotApplicable => "not_applicable",
                    SatisfiedBy::LocalTrust => "local_trust",
                    SatisfiedBy::PersistedTrust => "persisted_trust",
                    SatisfiedBy::TwoFactorDisabled => "two_factor_disabled",
                    SatisfiedBy::SignupGrace => "signup_grace",
                },
            ),
            GateOutcome::ChallengeRequired(reason) => (
                "challenge_required",
                match reason {
                    ChallengeReason::NeverVerified => "never_verified",
                    ChallengeReason::Expired => "expired",
                    ChallengeReason::SettingsUnavailable => "settings_unavailable",
                },
            ),
        }
    }
}

/// Result of writing a fresh verification through both stores.
///
/// Access is granted either way; `persisted == false` means other devices
/// and later sessions will not see this verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub verified_at: DateTime<Utc>,
    pub cached: bool,
    pub persisted: bool,
}

#[derive(Clone)]
pub struct StepUpGate {
    settings: Arc<dyn SettingsStore>,
    cache: LocalTrustCache,
    clock: Arc<dyn Clock>,
    trust_policy: TrustWindowPolicy,
    signup_grace: SignupGraceHeuristic,
    persist_retry: RetryConfig,
}

impl StepUpGate {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        session_storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
        config: &StepUpConfig,
    ) -> Self {
        Self {
            settings,
            cache: LocalTrustCache::new(session_storage, config.session_key.clone()),
            clock,
            trust_policy: TrustWindowPolicy::new(config.trust_window()),
            signup_grace: SignupGraceHeuristic::new(config.signup_grace()),
            persist_retry: config.persist_retry(),
        }
    }

    pub fn trust_policy(&self) -> &TrustWindowPolicy {
        &self.trust_policy
    }

    pub fn cache(&self) -> &LocalTrustCache {
        &self.cache
    }

    /// Evaluate the gate for one render pass.
    #[instrument(skip_all, fields(user_id = ?account.map(|a| a.user_id)))]
    pub async fn evaluate(&self, account: Option<&Account>, roles: &PrivilegeSet) -> GateOutcome {
        let outcome = self.decide(account, roles).await;
        let (label, source) = outcome.labels();
        metrics::record_evaluation(label, source);
        tracing::debug!(outcome = label, source = source, "Step-up gate evaluated");
        outcome
    }

    /// Record a successful OTP verification for `user_id`.
    ///
    /// The local record is written first and unconditionally; the persisted
    /// write is retried and then given up on.
    #[instrument(skip(self))]
    pub async fn commit(&self, user_id: Uuid) -> CommitOutcome {
        let now = self.clock.now();
        let cached = self.remember(user_id, now);
        let persisted = self.persist_verified_at(user_id, now).await;
        metrics::record_commit(persisted);

        tracing::info!(cached, persisted, "Step-up verification committed");
        CommitOutcome {
            verified_at: now,
            cached,
            persisted,
        }
    }

    /// Forget local trust at sign-out. The persisted row is untouched.
    pub fn end_session(&self) {
        if let Err(e) = self.cache.clear() {
            tracing::warn!(error = %e, "Failed to clear local trust record");
        }
    }

    async fn decide(&self, account: Option<&Account>, roles: &PrivilegeSet) -> GateOutcome {
        let account = match account {
            Some(account) if roles.is_privileged() => account,
            _ => return GateOutcome::Satisfied(SatisfiedBy::NotApplicable),
        };
        let now = self.clock.now();

        if self
            .cache
            .trusted_at(account.user_id, &self.trust_policy, now)
            .is_some()
        {
            return GateOutcome::Satisfied(SatisfiedBy::LocalTrust);
        }

        match self.settings.read_settings(account.user_id).await {
            Ok(Some(row)) => self.check_row(account, row, now).await,
            Ok(None) => self.create_row(account, now).await,
            Err(e) => {
                tracing::warn!(error = %e, "Security settings unreadable, requiring challenge");
                GateOutcome::ChallengeRequired(ChallengeReason::SettingsUnavailable)
            }
        }
    }

    async fn create_row(&self, account: &Account, now: DateTime<Utc>) -> GateOutcome {
        let grace = self.signup_grace.applies_to(account, now);
        let new_row = NewSecuritySettings::privileged_default(account.user_id, grace.then_some(now));

        match self.settings.create_settings(&new_row).await {
            Ok(_) if grace => {
                tracing::info!("Security settings created inside signup grace");
                self.remember(account.user_id, now);
                GateOutcome::Satisfied(SatisfiedBy::SignupGrace)
            }
            Ok(_) => {
                tracing::info!("Security settings created with two-factor enabled");
                GateOutcome::ChallengeRequired(ChallengeReason::NeverVerified)
            }
            Err(ServiceError::Conflict) => {
                // Another session created the row between our read and create.
                match self.settings.read_settings(account.user_id).await {
                    Ok(Some(row)) => self.check_row(account, row, now).await,
                    Ok(None) => GateOutcome::ChallengeRequired(ChallengeReason::SettingsUnavailable),
                    Err(e) => {
                        tracing::warn!(error = %e, "Security settings unreadable after conflict");
                        GateOutcome::ChallengeRequired(ChallengeReason::SettingsUnavailable)
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create security settings, requiring challenge");
                GateOutcome::ChallengeRequired(ChallengeReason::SettingsUnavailable)
            }
        }
    }

    async fn check_row(
        &self,
        account: &Account,
        row: SecuritySettings,
        now: DateTime<Utc>,
    ) -> GateOutcome {
        if !row.two_factor_enabled {
            return GateOutcome::Satisfied(SatisfiedBy::TwoFactorDisabled);
        }

        if let Some(verified_at) = row.two_factor_verified_at {
            if self.trust_policy.is_trusted(verified_at, now) {
                // Backfill with the persisted time so local trust never outlives it.
                self.remember(account.user_id, verified_at);
                return GateOutcome::Satisfied(SatisfiedBy::PersistedTrust);
            }
        }

        if self.signup_grace.applies_to(account, now) {
            self.persist_verified_at(account.user_id, now).await;
            self.remember(account.user_id, now);
            return GateOutcome::Satisfied(SatisfiedBy::SignupGrace);
        }

        if row.two_factor_verified_at.is_some() {
            GateOutcome::ChallengeRequired(ChallengeReason::Expired)
        } else {
            GateOutcome::ChallengeRequired(ChallengeReason::NeverVerified)
        }
    }

    fn remember(&self, user_id: Uuid, verified_at: DateTime<Utc>) -> bool {
        match self.cache.store(user_id, verified_at) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to cache trust locally");
                false
            }
        }
    }

    async fn persist_verified_at(&self, user_id: Uuid, at: DateTime<Utc>) -> bool {
        let patch = SettingsPatch::verified_at(at);
        let result = retry_call(&self.persist_retry, "patch_settings", || {
            self.settings.patch_settings(user_id, &patch)
        })
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Giving up on persisting verification time"
                );
                false
            }
        }
    }
}
