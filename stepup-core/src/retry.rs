//! Retrying calls to flaky collaborators.
//!
//! Errors decide for themselves whether another attempt can help, through
//! [`Retryable`]. Backoff grows exponentially up to a cap, with optional
//! jitter so concurrent sessions do not retry in lockstep.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Adds up to 25% on top of each backoff.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Short backoffs for calls a user is waiting on.
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (zero-based).
    fn backoff_duration(&self, retry: u32) -> Duration {
        let scaled = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(retry as i32);
        let base_ms = scaled.min(self.max_backoff.as_millis() as f64) as u64;

        let jitter_ms = if self.add_jitter {
            (base_ms as f64 * 0.25 * rand::thread_rng().gen::<f64>()) as u64
        } else {
            0
        };
        Duration::from_millis(base_ms + jitter_ms)
    }
}

/// Run `f` until it succeeds, fails permanently, or runs out of retries.
///
/// The last error is returned as-is. Each retry is logged at `warn` with
/// `operation_name`.
pub async fn retry_call<F, Fut, T, E>(config: &RetryConfig, operation_name: &str, f: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut retries = 0;

    loop {
        let err = match f().await {
            Ok(value) => {
                if retries > 0 {
                    info!(operation = operation_name, retries, "Call succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            warn!(operation = operation_name, error = %err, "Call failed permanently");
            return Err(err);
        }
        if retries >= config.max_retries {
            warn!(operation = operation_name, retries, error = %err, "Retries exhausted");
            return Err(err);
        }

        let backoff = config.backoff_duration(retries);
        warn!(
            operation = operation_name,
            retry = retries + 1,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Call failed, backing off"
        );
        sleep(backoff).await;
        retries += 1;
    }
}
