mod common;

use chrono::Duration as ChronoDuration;
use common::{privileged, TestHarness};
use std::time::Duration;
use stepup_gate::{ChallengeReason, GuardDecision, IdentitySnapshot};
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

#[tokio::test(start_paused = true)]
async fn test_roles_arriving_in_time_are_used() {
    let harness = TestHarness::new();
    let runtime = harness.runtime();
    let account = harness.established_account();
    harness.insert_row(account.user_id, true, None);

    let (tx, mut rx) = watch::channel(IdentitySnapshot::signed_in(account.clone()));
    let guard = runtime.guard.clone();
    let start = Instant::now();
    let resolving = tokio::spawn(async move { guard.resolve(&mut rx).await });

    sleep(Duration::from_secs(2)).await;
    tx.send(IdentitySnapshot::signed_in(account.clone()).with_roles(privileged()))
        .unwrap();

    let resolution = resolving.await.unwrap();
    assert!(!resolution.roles_timed_out);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(
        resolution.decision,
        GuardDecision::Challenge {
            account,
            reason: ChallengeReason::NeverVerified,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_roles_time_out_and_proceed_empty() {
    let harness = TestHarness::new();
    let runtime = harness.runtime();
    let account = harness.established_account();
    harness.insert_row(account.user_id, true, None);

    let (_tx, mut rx) = watch::channel(IdentitySnapshot::signed_in(account));
    let start = Instant::now();
    let resolution = runtime.guard.resolve(&mut rx).await;

    assert!(resolution.roles_timed_out);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(6));
    // An empty set is not privileged, so nothing was gated.
    assert_eq!(resolution.decision, GuardDecision::Render);
    assert_eq!(harness.settings.read_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_account_wait_is_not_bounded() {
    let harness = TestHarness::new();
    let runtime = harness.runtime();
    let account = harness.established_account();
    harness.seed_trust(account.user_id, harness.now() - ChronoDuration::hours(1));

    let (tx, mut rx) = watch::channel(IdentitySnapshot::loading());
    let guard = runtime.guard.clone();
    let resolving = tokio::spawn(async move { guard.resolve(&mut rx).await });

    sleep(Duration::from_secs(10)).await;
    tx.send(IdentitySnapshot::signed_in(account).with_roles(privileged()))
        .unwrap();

    let resolution = resolving.await.unwrap();
    assert!(!resolution.roles_timed_out);
    assert_eq!(resolution.decision, GuardDecision::Render);
}

#[tokio::test(start_paused = true)]
async fn test_signed_out_identity_is_anonymous() {
    let harness = TestHarness::new();
    let runtime = harness.runtime();

    let (tx, mut rx) = watch::channel(IdentitySnapshot::loading());
    let guard = runtime.guard.clone();
    let resolving = tokio::spawn(async move { guard.resolve(&mut rx).await });

    tx.send(IdentitySnapshot::default()).unwrap();
    let resolution = resolving.await.unwrap();
    assert_eq!(resolution.decision, GuardDecision::Anonymous);
    assert!(!resolution.roles_timed_out);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_while_waiting_for_roles_is_anonymous() {
    let harness = TestHarness::new();
    let runtime = harness.runtime();
    let account = harness.established_account();

    let (tx, mut rx) = watch::channel(IdentitySnapshot::signed_in(account));
    let guard = runtime.guard.clone();
    let resolving = tokio::spawn(async move { guard.resolve(&mut rx).await });

    sleep(Duration::from_secs(1)).await;
    tx.send(IdentitySnapshot::default()).unwrap();

    let resolution = resolving.await.unwrap();
    assert_eq!(resolution.decision, GuardDecision::Anonymous);
}

#[tokio::test(start_paused = true)]
async fn test_closed_provider_still_waits_out_timeout() {
    let harness = TestHarness::new();
    let runtime = harness.runtime();
    let account = harness.established_account();

    let (tx, mut rx) = watch::channel(IdentitySnapshot::signed_in(account));
    drop(tx);

    let start = Instant::now();
    let resolution = runtime.guard.resolve(&mut rx).await;
    assert!(resolution.roles_timed_out);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(resolution.decision, GuardDecision::Render);
}

#[tokio::test]
async fn test_resolved_identity_goes_straight_to_gate() {
    let harness = TestHarness::new();
    let runtime = harness.runtime();
    let account = harness.account_aged(ChronoDuration::zero());

    let (_tx, mut rx) =
        watch::channel(IdentitySnapshot::signed_in(account.clone()).with_roles(privileged()));
    let resolution = runtime.guard.resolve(&mut rx).await;

    assert!(!resolution.roles_timed_out);
    assert_eq!(resolution.decision, GuardDecision::Render);
    assert!(harness.settings.get(account.user_id).is_some());
}
