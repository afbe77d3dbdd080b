//! Concurrent evaluations.
//!
//! Evaluations of the same user serialize on the per-user lock, so the
//! second one sees the fix the first one stored. Different users do not
//! wait for each other.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::Duration as ChronoDuration;
use common::{Harness, check_in, now};
use futures::future::join_all;
use geoguard_core::detectors::{DetectorKind, FIRST_OBSERVATION};
use geoguard_core::model::UserId;
use geoguard_core::policy::Action;
use geoguard_core::record::TerminalState;
use geoguard_engine::mocks::Fault;
use geoguard_testing::fixtures;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_same_user_evaluations_are_serialized() {
    let harness = Harness::new();
    // Slow reads keep the first evaluation inside its critical section
    // while the second one queues on the lock.
    harness
        .history
        .set_read_fault(Fault::Delay(Duration::from_millis(50)))
        .unwrap();

    let first = check_in(
        "u-1",
        fixtures::sample_at(fixtures::far_away(), now() + ChronoDuration::minutes(10)),
    );
    let second = check_in(
        "u-1",
        fixtures::clean_sample(now() + ChronoDuration::minutes(20)),
    );

    let results = join_all([harness.evaluate(&first), harness.evaluate(&second)]).await;

    let travel_first = results[0].finding(DetectorKind::ImpossibleTravel).unwrap();
    assert!(!travel_first.triggered);
    assert_eq!(travel_first.evidence, vec![FIRST_OBSERVATION.to_string()]);

    // ~660 km in ten minutes against the fix stored by the first call.
    let travel_second = results[1].finding(DetectorKind::ImpossibleTravel).unwrap();
    assert!(travel_second.triggered);

    assert_eq!(harness.history.update_count(), 2);
    let stored = harness.history.fix_for(&UserId::new("u-1")).unwrap().unwrap();
    assert_eq!(stored.coordinate(), fixtures::clean_sample(now()).coordinate());
}

#[tokio::test(start_paused = true)]
async fn test_different_users_run_in_parallel() {
    let harness = Harness::new();
    harness
        .history
        .set_read_fault(Fault::Delay(Duration::from_secs(1)))
        .unwrap();

    let requests: Vec<_> = (0..4)
        .map(|i| check_in(&format!("u-{i}"), fixtures::clean_sample(now())))
        .collect();

    let started = tokio::time::Instant::now();
    let results = join_all(requests.iter().map(|r| harness.evaluate(r))).await;
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 4);
    assert!(elapsed < Duration::from_millis(1_500), "took {elapsed:?}");
    assert_eq!(harness.history.update_count(), 4);
    assert_eq!(harness.recorder.count().unwrap(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_block_is_visible_to_next_evaluation_of_same_user() {
    let harness = Harness::new();
    // Slow writes widen the window between the block decision and the
    // next evaluation taking the lock.
    harness
        .history
        .set_write_fault(Fault::Delay(Duration::from_millis(50)))
        .unwrap();

    let hostile = check_in(
        "u-1",
        fixtures::clean_sample(now()).with_fingerprint(fixtures::hostile_fingerprint()),
    );
    let clean = check_in(
        "u-1",
        fixtures::clean_sample(now() + ChronoDuration::minutes(5)),
    );

    let results = join_all([harness.evaluate(&hostile), harness.evaluate(&clean)]).await;

    assert_eq!(results[0].action(), Action::Block);
    assert!(matches!(results[0].terminal_state, TerminalState::Analyzed));

    assert_eq!(results[1].action(), Action::Block);
    assert!(matches!(
        results[1].terminal_state,
        TerminalState::ActiveBlock { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_slow_recorder_does_not_hold_the_user_lock() {
    let harness = Harness::new();
    // Longer than every lock attempt put together, shorter than the
    // recorder timeout.
    harness
        .recorder
        .set_fault(Fault::Delay(Duration::from_millis(4_500)))
        .unwrap();

    let first = check_in(
        "u-1",
        fixtures::sample_at(fixtures::far_away(), now() + ChronoDuration::minutes(10)),
    );
    let second = check_in(
        "u-1",
        fixtures::clean_sample(now() + ChronoDuration::minutes(20)),
    );

    let results = join_all([harness.evaluate(&first), harness.evaluate(&second)]).await;

    let travel = results[1].finding(DetectorKind::ImpossibleTravel).unwrap();
    assert!(travel.triggered, "evidence: {:?}", travel.evidence);
    assert_eq!(harness.recorder.count().unwrap(), 2);
}
