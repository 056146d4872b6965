pub mod policy;
pub mod step_up;
pub mod trust_cache;

pub use policy::{SignupGraceHeuristic, TrustWindowPolicy};
pub use step_up::{ChallengeReason, CommitOutcome, GateOutcome, SatisfiedBy, StepUpGate};
pub use trust_cache::LocalTrustCache;
