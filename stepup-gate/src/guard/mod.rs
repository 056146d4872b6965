//! Route guard for protected screens.
//!
//! The identity provider publishes snapshots on a `watch` channel. Once an
//! account is present the guard waits a bounded time for the privilege set;
//! if it has not arrived by then the guard proceeds with an empty set and
//! says so in the logs and the timeout counter.

use std::time::Duration;
use stepup_core::timer::{CancellableTimer, TimerOutcome};
use tokio::sync::watch;
use tracing::instrument;

use crate::gate::{ChallengeReason, GateOutcome, StepUpGate};
use crate::models::{Account, PrivilegeSet};
use crate::services::metrics;

/// What the identity provider currently knows.
#[derive(Debug, Clone, Default)]
pub struct IdentitySnapshot {
    pub account: Option<Account>,
    /// `None` until role resolution finishes.
    pub roles: Option<PrivilegeSet>,
    pub is_loading: bool,
}

impl IdentitySnapshot {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn signed_in(account: Account) -> Self {
        Self {
            account: Some(account),
            roles: None,
            is_loading: false,
        }
    }

    pub fn with_roles(mut self, roles: PrivilegeSet) -> Self {
        self.roles = Some(roles);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Nobody is signed in; the shell decides where to send them.
    Anonymous,
    Render,
    Challenge {
        account: Account,
        reason: ChallengeReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardResolution {
    pub decision: GuardDecision,
    /// Set when the privilege set did not arrive in time.
    pub roles_timed_out: bool,
}

#[derive(Clone)]
pub struct RouteGuard {
    gate: StepUpGate,
    privilege_timeout: Duration,
}

impl RouteGuard {
    pub fn new(gate: StepUpGate, privilege_timeout: Duration) -> Self {
        Self {
            gate,
            privilege_timeout,
        }
    }

    pub fn gate(&self) -> &StepUpGate {
        &self.gate
    }

    /// Decide what a protected screen shows.
    ///
    /// Waits for the account without a bound (the provider's own loading
    /// state covers that), then at most `privilege_timeout` for roles.
    #[instrument(skip_all)]
    pub async fn resolve(&self, identity: &mut watch::Receiver<IdentitySnapshot>) -> GuardResolution {
        let Some(mut account) = wait_for_account(identity).await else {
            return GuardResolution {
                decision: GuardDecision::Anonymous,
                roles_timed_out: false,
            };
        };

        let timer = CancellableTimer::start(self.privilege_timeout);
        let mut provider_open = true;
        let (roles, roles_timed_out) = loop {
            {
                let snapshot = identity.borrow_and_update();
                match (&snapshot.account, &snapshot.roles) {
                    (None, _) if !snapshot.is_loading => {
                        return GuardResolution {
                            decision: GuardDecision::Anonymous,
                            roles_timed_out: false,
                        };
                    }
                    (Some(current), Some(roles)) => {
                        account = current.clone();
                        break (roles.clone(), false);
                    }
                    (Some(current), None) => account = current.clone(),
                    (None, _) => {}
                }
            }

            if !provider_open {
                timer.wait().await;
                break (PrivilegeSet::new(), true);
            }

            tokio::select! {
                biased;
                changed = identity.changed() => provider_open = changed.is_ok(),
                outcome = timer.wait() => {
                    if outcome == TimerOutcome::Elapsed {
                        break (PrivilegeSet::new(), true);
                    }
                }
            }
        };

        if roles_timed_out {
            metrics::record_privilege_timeout();
            tracing::warn!(
                user_id = %account.user_id,
                timeout_secs = self.privilege_timeout.as_secs(),
                "Privilege set not resolved in time, proceeding with no roles"
            );
        }

        let decision = match self.gate.evaluate(Some(&account), &roles).await {
            GateOutcome::Satisfied(_) => GuardDecision::Render,
            GateOutcome::ChallengeRequired(reason) => GuardDecision::Challenge { account, reason },
        };

        GuardResolution {
            decision,
            roles_timed_out,
        }
    }
}

/// `None` once loading finished without an account, or the provider went away.
async fn wait_for_account(identity: &mut watch::Receiver<IdentitySnapshot>) -> Option<Account> {
    loop {
        {
            let snapshot = identity.borrow_and_update();
            if let Some(account) = &snapshot.account {
                return Some(account.clone());
            }
            if !snapshot.is_loading {
                return None;
            }
        }
        identity.changed().await.ok()?;
    }
}
