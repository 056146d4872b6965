//! Step-up two-factor gate for privileged accounts.
//!
//! Privileged users must have passed an email OTP challenge within the
//! trust window before protected screens render. See [`gate::StepUpGate`]
//! for the decision, [`challenge::OtpChallengeFlow`] for the challenge
//! screen and [`guard::RouteGuard`] for wiring both to an identity feed.

pub mod challenge;
pub mod config;
pub mod gate;
pub mod guard;
pub mod models;
pub mod runtime;
pub mod services;

pub use challenge::{ChallengeState, FlowEvent, FlowMessage, OtpChallengeFlow};
pub use config::StepUpConfig;
pub use gate::{ChallengeReason, CommitOutcome, GateOutcome, SatisfiedBy, StepUpGate};
pub use guard::{GuardDecision, GuardResolution, IdentitySnapshot, RouteGuard};
pub use runtime::StepUpRuntime;
