//! Time-window policies.
//!
//! Both policies are pure: the caller passes `now`, nothing reads a clock.
//! The local cache check and the persisted-store check go through the same
//! [`TrustWindowPolicy`] so the two can never disagree.

use chrono::{DateTime, Duration, Utc};

use crate::config::{SIGNUP_GRACE_SECONDS, TRUST_WINDOW_HOURS};
use crate::models::Account;

/// How far in the future a timestamp may sit before it stops counting.
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 5 * 60;

/// Strict at the far edge: exactly `window` old is outside.
fn younger_than(since: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(since) < window
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustWindowPolicy {
    window: Duration,
}

impl Default for TrustWindowPolicy {
    fn default() -> Self {
        Self::new(Duration::hours(TRUST_WINDOW_HOURS))
    }
}

impl TrustWindowPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Verifications in the future count only within [`MAX_CLOCK_SKEW_SECONDS`].
    pub fn is_trusted(&self, verified_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        verified_at.signed_duration_since(now) <= Duration::seconds(MAX_CLOCK_SKEW_SECONDS)
            && younger_than(verified_at, now, self.window)
    }
}

/// Lets an account created moments ago skip the challenge, since signup
/// already proved control of the inbox.
///
/// Only account age is checked, not whether a signup OTP actually ran.
/// Keep it that way until product decides otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignupGraceHeuristic {
    window: Duration,
}

impl Default for SignupGraceHeuristic {
    fn default() -> Self {
        Self::new(Duration::seconds(SIGNUP_GRACE_SECONDS))
    }
}

impl SignupGraceHeuristic {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn applies_to(&self, account: &Account, now: DateTime<Utc>) -> bool {
        younger_than(account.created_utc, now, self.window)
    }
}
