//! Gate counters.
//!
//! Recorded through the `metrics` facade; they are no-ops until the host
//! installs a recorder.

pub fn record_evaluation(outcome: &'static str, source: &'static str) {
    metrics::counter!(
        "stepup_gate_evaluations_total",
        "outcome" => outcome,
        "source" => source
    )
    .increment(1);
}

pub fn record_commit(persisted: bool) {
    let persisted = if persisted { "true" } else { "false" };
    metrics::counter!("stepup_gate_commits_total", "persisted" => persisted).increment(1);
}

pub fn record_otp_event(event: &'static str) {
    metrics::counter!("stepup_otp_events_total", "event" => event).increment(1);
}

pub fn record_privilege_timeout() {
    metrics::counter!("stepup_privilege_timeouts_total").increment(1);
}
