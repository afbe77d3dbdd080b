//! Dependency failures, timeouts and cancellation.
//!
//! Every collaborator can fail or stall without the engine returning an
//! error; each has its own fallback. Cancellation and deadlines before the
//! policy decision give an indeterminate outcome, never an allow.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::Duration as ChronoDuration;
use common::{Harness, check_in, now};
use geoguard_core::config::{EngineConfig, TimeoutConfig};
use geoguard_core::detectors::{DetectorKind, INSUFFICIENT_DATA};
use geoguard_core::model::UserId;
use geoguard_core::policy::Action;
use geoguard_core::record::TerminalState;
use geoguard_engine::mocks::Fault;
use geoguard_engine::providers::HistoryStore;
use geoguard_engine::{EvaluationContext, EvaluationOutcome, IndeterminateReason, Stage};
use geoguard_testing::fixtures;
use std::time::Duration;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_zone_directory_failure_counts_as_outside_zone() {
    let harness = Harness::new();
    harness.zones.set_fault(Fault::Fail).unwrap();

    let result = harness
        .evaluate(&check_in("u-1", fixtures::clean_sample(now())))
        .await;

    assert!(!result.within_zone());
    assert_eq!(result.zone_id(), None);
    assert!(result.distance_meters().is_infinite());
    assert!(
        (result.assessment().total_score - EngineConfig::default().outside_zone_penalty).abs()
            < f64::EPSILON
    );
    assert_eq!(result.action(), Action::Warn);
}

#[tokio::test(start_paused = true)]
async fn test_zone_directory_timeout_counts_as_outside_zone() {
    let harness = Harness::new();
    harness
        .zones
        .set_fault(Fault::Delay(Duration::from_secs(30)))
        .unwrap();

    let result = harness
        .evaluate(&check_in("u-1", fixtures::clean_sample(now())))
        .await;

    assert!(!result.within_zone());
    assert_eq!(result.action(), Action::Warn);
}

#[tokio::test(start_paused = true)]
async fn test_history_timeout_means_no_history() {
    let harness = Harness::new();
    let user = UserId::new("u-1");
    harness
        .history
        .seed_fix(&user, fixtures::sample_at(fixtures::far_away(), now() - ChronoDuration::minutes(5)))
        .unwrap();
    harness
        .history
        .set_read_fault(Fault::Delay(Duration::from_secs(30)))
        .unwrap();

    let result = harness
        .evaluate(&check_in("u-1", fixtures::clean_sample(now())))
        .await;

    let travel = result.finding(DetectorKind::ImpossibleTravel).unwrap();
    assert!(!travel.triggered);
    assert_eq!(travel.evidence, vec![INSUFFICIENT_DATA.to_string()]);
    assert_eq!(result.action(), Action::Allow);
}

#[tokio::test]
async fn test_block_status_failure_means_not_blocked() {
    let harness = Harness::new();
    let user = UserId::new("u-1");
    harness.history.set_block_fault(Fault::Fail).unwrap();
    // The block exists but cannot be read.
    assert_ok!(
        harness
            .history
            .set_block(&user, Duration::from_secs(3600), "earlier violation")
            .await
    );

    let result = harness
        .evaluate(&check_in("u-1", fixtures::clean_sample(now())))
        .await;

    assert!(matches!(result.terminal_state, TerminalState::Analyzed));
    assert_eq!(result.action(), Action::Allow);
}

#[tokio::test]
async fn test_recorder_failure_still_returns_verdict() {
    let harness = Harness::new();
    harness.recorder.set_fault(Fault::Fail).unwrap();
    let hostile = fixtures::clean_sample(now()).with_fingerprint(fixtures::hostile_fingerprint());

    let result = harness.evaluate(&check_in("u-1", hostile)).await;

    assert_eq!(result.action(), Action::Block);
    assert!(result.record_id.is_none());
    assert_eq!(harness.recorder.count().unwrap(), 0);

    // The rest of the commit still ran.
    assert_eq!(harness.history.update_count(), 1);
    let alerts = harness.alerts.alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].record_id, None);
}

#[tokio::test]
async fn test_alert_and_history_write_failures_are_absorbed() {
    let harness = Harness::new();
    harness.alerts.set_fault(Fault::Fail).unwrap();
    harness.history.set_write_fault(Fault::Fail).unwrap();
    let hostile = fixtures::clean_sample(now()).with_fingerprint(fixtures::hostile_fingerprint());

    let result = harness.evaluate(&check_in("u-1", hostile)).await;

    assert_eq!(result.action(), Action::Block);
    assert!(result.record_id.is_some());
    assert_eq!(harness.alerts.count().unwrap(), 0);
    assert!(harness.history.fix_for(&UserId::new("u-1")).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_alert_is_bounded() {
    let config = EngineConfig::default().with_timeouts(TimeoutConfig {
        alert_ms: 100,
        ..TimeoutConfig::default()
    });
    let harness = Harness::with_config(config);
    harness
        .alerts
        .set_fault(Fault::Delay(Duration::from_secs(60)))
        .unwrap();
    let hostile = fixtures::clean_sample(now()).with_fingerprint(fixtures::hostile_fingerprint());

    let started = tokio::time::Instant::now();
    let result = harness.evaluate(&check_in("u-1", hostile)).await;

    assert_eq!(result.action(), Action::Block);
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test]
async fn test_cancelled_before_start_is_indeterminate() {
    let harness = Harness::new();
    let ctx = EvaluationContext::new();
    ctx.token().cancel();

    let outcome = harness
        .engine
        .evaluate(&check_in("u-1", fixtures::clean_sample(now())), &ctx)
        .await
        .unwrap();

    let EvaluationOutcome::Indeterminate(stopped) = outcome else {
        panic!("expected indeterminate, got {outcome:?}");
    };
    assert_eq!(stopped.stage, Stage::Whitelist);
    assert_eq!(stopped.reason, IndeterminateReason::Cancelled);
    assert!(!EvaluationOutcome::Indeterminate(stopped).is_allow());

    assert_eq!(harness.recorder.count().unwrap(), 0);
    assert_eq!(harness.history.update_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_reads_is_indeterminate() {
    let harness = Harness::new();
    harness
        .zones
        .set_fault(Fault::Delay(Duration::from_secs(10)))
        .unwrap();
    let ctx = EvaluationContext::new().with_timeout(Duration::from_millis(100));

    let outcome = harness
        .engine
        .evaluate(&check_in("u-1", fixtures::clean_sample(now())), &ctx)
        .await
        .unwrap();

    let EvaluationOutcome::Indeterminate(stopped) = outcome else {
        panic!("expected indeterminate, got {outcome:?}");
    };
    assert_eq!(stopped.stage, Stage::BlockStatus);
    assert_eq!(stopped.reason, IndeterminateReason::DeadlineExceeded);
    assert_eq!(harness.recorder.count().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_flight_is_indeterminate() {
    let harness = Harness::new();
    harness
        .history
        .set_read_fault(Fault::Delay(Duration::from_secs(1)))
        .unwrap();
    let ctx = EvaluationContext::new();
    let token = ctx.token();

    let request = check_in("u-1", fixtures::clean_sample(now()));
    let (outcome, ()) = tokio::join!(harness.engine.evaluate(&request, &ctx), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    let outcome = outcome.unwrap();
    assert!(outcome.is_indeterminate());
    assert!(!outcome.is_allow());
    assert_eq!(harness.history.update_count(), 0);
}
