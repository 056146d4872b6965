//! Cancellable one-shot timer.
//!
//! Used for every bounded wait in the gate: the privilege-resolution
//! timeout and the OTP resend cooldown. Dropping a timer cancels it, so a
//! timer never outlives the screen or flow that owns it.

use std::time::Duration;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How a wait on a [`CancellableTimer`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    Elapsed,
    Cancelled,
}

#[derive(Debug)]
pub struct CancellableTimer {
    duration: Duration,
    deadline: Instant,
    token: CancellationToken,
}

impl CancellableTimer {
    /// Start a timer that elapses `duration` from now.
    pub fn start(duration: Duration) -> Self {
        Self {
            duration,
            deadline: Instant::now() + duration,
            token: CancellationToken::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time left before the deadline; zero once elapsed or cancelled.
    pub fn remaining(&self) -> Duration {
        if self.token.is_cancelled() {
            return Duration::ZERO;
        }
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whole seconds left, rounded up, for countdown display.
    pub fn remaining_secs(&self) -> u64 {
        let remaining = self.remaining();
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && Instant::now() < self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this timer from another task.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait until the deadline or cancellation, whichever comes first.
    pub async fn wait(&self) -> TimerOutcome {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => TimerOutcome::Cancelled,
            _ = sleep_until(self.deadline) => TimerOutcome::Elapsed,
        }
    }

    /// Invoke `on_tick` with the whole seconds remaining every `period`,
    /// starting immediately, and a final `0` when the deadline passes.
    /// Cancellation stops ticking without a final callback.
    pub async fn run_ticks<F>(&self, period: Duration, mut on_tick: F) -> TimerOutcome
    where
        F: FnMut(u64),
    {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return TimerOutcome::Cancelled,
                _ = sleep_until(self.deadline) => {
                    on_tick(0);
                    return TimerOutcome::Elapsed;
                }
                _ = ticker.tick() => on_tick(self.remaining_secs()),
            }
        }
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
