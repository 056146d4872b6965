//! OTP challenge flow.
//!
//! Client-side state machine for one challenge screen:
//!
//! ```text
//! Idle -> Sending -> AwaitingCode -> Verifying -> Verified
//!           ^  |          ^  |            |
//!           |  +-> Idle   |  +- resend    +-> AwaitingCode (rejected / failed)
//! ```
//!
//! Each external call is split into a ticket (`begin_*`) and a completion
//! (`complete_*`). Tickets carry the flow generation; [`OtpChallengeFlow::abandon`]
//! bumps it, so completions arriving after the user left are dropped. The
//! async helpers (`send_code`, `enter_code`, `submit_code`) run both halves
//! in sequence for shells that simply await.

use std::time::Duration;
use stepup_core::timer::{CancellableTimer, TimerOutcome};
use uuid::Uuid;

use crate::gate::{CommitOutcome, StepUpGate};
use crate::models::{Account, OtpPurpose, OTP_CODE_LENGTH};
use crate::services::{metrics, OtpService, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Idle,
    Sending,
    AwaitingCode,
    Verifying,
    Verified,
}

/// Inline message shown on the challenge screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowMessage {
    SendFailed,
    InvalidCode(String),
    VerifyFailed,
}

impl FlowMessage {
    pub fn text(&self) -> &str {
        match self {
            FlowMessage::SendFailed => "We couldn't send a code. Please try again.",
            FlowMessage::InvalidCode(msg) => msg,
            FlowMessage::VerifyFailed => "Verification failed. Please try again.",
        }
    }
}

/// What a call into the flow did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Nothing to do in the current state.
    NoOp,
    CodeSent,
    SendFailed,
    Verified(CommitOutcome),
    Rejected,
    VerifyFailed,
    /// Completion for a ticket from an abandoned generation.
    Stale,
}

#[derive(Debug, Clone)]
pub struct SendTicket {
    generation: u64,
    pub email: String,
    pub purpose: OtpPurpose,
}

#[derive(Debug, Clone)]
pub struct VerifyTicket {
    generation: u64,
    pub email: String,
    pub code: String,
}

pub struct OtpChallengeFlow {
    user_id: Uuid,
    email: String,
    purpose: OtpPurpose,
    state: ChallengeState,
    code: String,
    message: Option<FlowMessage>,
    cooldown: Option<CancellableTimer>,
    cooldown_duration: Duration,
    generation: u64,
}

impl OtpChallengeFlow {
    pub fn new(account: &Account, purpose: OtpPurpose, cooldown: Duration) -> Self {
        Self {
            user_id: account.user_id,
            email: account.email.clone(),
            purpose,
            state: ChallengeState::Idle,
            code: String::new(),
            message: None,
            cooldown: None,
            cooldown_duration: cooldown,
            generation: 0,
        }
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> Option<&FlowMessage> {
        self.message.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the resend action is enabled.
    pub fn can_resend(&self) -> bool {
        self.state == ChallengeState::AwaitingCode && !self.cooldown_active()
    }

    /// Whole seconds until resend is enabled; zero when it already is.
    pub fn resend_cooldown_remaining(&self) -> u64 {
        self.cooldown
            .as_ref()
            .map_or(0, CancellableTimer::remaining_secs)
    }

    /// The running cooldown, for shells that drive a countdown display.
    pub fn cooldown(&self) -> Option<&CancellableTimer> {
        self.cooldown.as_ref()
    }

    /// Call `on_tick` with the seconds left once per second until resend
    /// becomes available. Returns at once when there is no cooldown.
    pub async fn run_cooldown_ticks<F>(&self, on_tick: F) -> TimerOutcome
    where
        F: FnMut(u64),
    {
        match &self.cooldown {
            Some(timer) => timer.run_ticks(Duration::from_secs(1), on_tick).await,
            None => TimerOutcome::Elapsed,
        }
    }

    fn cooldown_active(&self) -> bool {
        self.cooldown.as_ref().is_some_and(CancellableTimer::is_active)
    }

    /// Start a send (from `Idle`) or a resend (from `AwaitingCode` once the
    /// cooldown is over). `None` when neither applies.
    pub fn begin_send(&mut self) -> Option<SendTicket> {
        match self.state {
            ChallengeState::Idle => {}
            ChallengeState::AwaitingCode if !self.cooldown_active() => {
                self.code.clear();
            }
            ChallengeState::AwaitingCode => {
                metrics::record_otp_event("resend_blocked");
                return None;
            }
            _ => return None,
        }

        self.state = ChallengeState::Sending;
        self.message = None;
        Some(SendTicket {
            generation: self.generation,
            email: self.email.clone(),
            purpose: self.purpose,
        })
    }

    pub fn complete_send(&mut self, ticket: SendTicket, result: Result<(), ServiceError>) -> FlowEvent {
        if ticket.generation != self.generation || self.state != ChallengeState::Sending {
            metrics::record_otp_event("stale");
            return FlowEvent::Stale;
        }

        match result {
            Ok(()) => {
                self.state = ChallengeState::AwaitingCode;
                self.cooldown = Some(CancellableTimer::start(self.cooldown_duration));
                metrics::record_otp_event("sent");
                tracing::info!(user_id = %self.user_id, purpose = ?self.purpose, "Challenge code sent");
                FlowEvent::CodeSent
            }
            Err(e) => {
                self.state = ChallengeState::Idle;
                self.message = Some(FlowMessage::SendFailed);
                metrics::record_otp_event("send_failed");
                tracing::warn!(user_id = %self.user_id, error = %e, "Failed to send challenge code");
                FlowEvent::SendFailed
            }
        }
    }

    /// Replace the entered code with the digits of `text`, capped at six.
    /// Returns a ticket the moment the sixth digit lands.
    pub fn input(&mut self, text: &str) -> Option<VerifyTicket> {
        if self.state != ChallengeState::AwaitingCode {
            return None;
        }

        self.code = text
            .chars()
            .filter(char::is_ascii_digit)
            .take(OTP_CODE_LENGTH)
            .collect();

        if self.code.len() == OTP_CODE_LENGTH {
            self.begin_verify()
        } else {
            None
        }
    }

    /// Explicit submit; only a complete code is sent.
    pub fn submit(&mut self) -> Option<VerifyTicket> {
        if self.state != ChallengeState::AwaitingCode || self.code.len() != OTP_CODE_LENGTH {
            return None;
        }
        self.begin_verify()
    }

    fn begin_verify(&mut self) -> Option<VerifyTicket> {
        self.state = ChallengeState::Verifying;
        self.message = None;
        Some(VerifyTicket {
            generation: self.generation,
            email: self.email.clone(),
            code: self.code.clone(),
        })
    }

    /// Apply the verifier's verdict. On success the verification is
    /// committed through `gate` before the flow reports `Verified`.
    pub async fn complete_verify(
        &mut self,
        ticket: VerifyTicket,
        result: Result<(), ServiceError>,
        gate: &StepUpGate,
    ) -> FlowEvent {
        if ticket.generation != self.generation || self.state != ChallengeState::Verifying {
            metrics::record_otp_event("stale");
            return FlowEvent::Stale;
        }

        // Stale digits are never resubmitted.
        self.code.clear();

        match result {
            Ok(()) => {
                let outcome = gate.commit(self.user_id).await;
                self.state = ChallengeState::Verified;
                self.cooldown = None;
                metrics::record_otp_event("verified");
                FlowEvent::Verified(outcome)
            }
            Err(ServiceError::InvalidCode(msg)) => {
                self.state = ChallengeState::AwaitingCode;
                self.message = Some(FlowMessage::InvalidCode(msg));
                metrics::record_otp_event("rejected");
                FlowEvent::Rejected
            }
            Err(e) => {
                self.state = ChallengeState::AwaitingCode;
                self.message = Some(FlowMessage::VerifyFailed);
                metrics::record_otp_event("verify_failed");
                tracing::warn!(user_id = %self.user_id, error = %e, "Challenge verification failed");
                FlowEvent::VerifyFailed
            }
        }
    }

    /// The screen went away: drop in-flight work and start over.
    pub fn abandon(&mut self) {
        self.generation += 1;
        self.state = ChallengeState::Idle;
        self.code.clear();
        self.message = None;
        self.cooldown = None;
    }

    /// Send or resend, awaiting the OTP service.
    pub async fn send_code(&mut self, otp: &dyn OtpService) -> FlowEvent {
        let Some(ticket) = self.begin_send() else {
            return FlowEvent::NoOp;
        };
        let result = otp.send_code(&ticket.email, ticket.purpose).await;
        self.complete_send(ticket, result)
    }

    /// Feed input text; verifies immediately if it completes the code.
    pub async fn enter_code(&mut self, text: &str, otp: &dyn OtpService, gate: &StepUpGate) -> FlowEvent {
        match self.input(text) {
            Some(ticket) => self.verify(ticket, otp, gate).await,
            None => FlowEvent::NoOp,
        }
    }

    pub async fn submit_code(&mut self, otp: &dyn OtpService, gate: &StepUpGate) -> FlowEvent {
        match self.submit() {
            Some(ticket) => self.verify(ticket, otp, gate).await,
            None => FlowEvent::NoOp,
        }
    }

    async fn verify(&mut self, ticket: VerifyTicket, otp: &dyn OtpService, gate: &StepUpGate) -> FlowEvent {
        let result = otp.verify_code(&ticket.email, &ticket.code).await;
        self.complete_verify(ticket, result, gate).await
    }
}
