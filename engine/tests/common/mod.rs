//! Shared harness for the engine integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::{DateTime, Utc};
use geoguard_core::config::EngineConfig;
use geoguard_core::environment::Clock;
use geoguard_core::model::{AttendanceType, LocationSample, WorkZone};
use geoguard_engine::mocks::{
    MockAlertDispatcher, MockDetectionRecorder, MockHistoryStore, MockIpReputation,
    MockZoneDirectory,
};
use geoguard_engine::providers::ConfiguredWhitelist;
use geoguard_engine::{
    EngineEnvironment, EvaluationContext, EvaluationOutcome, EvaluationRequest, EvaluationResult,
    LocationSecurityEngine,
};
use geoguard_testing::mocks::FixedClock;
use geoguard_testing::{fixtures, test_clock};

pub type TestEngine = LocationSecurityEngine<
    MockZoneDirectory,
    MockHistoryStore,
    MockDetectionRecorder,
    MockAlertDispatcher,
    ConfiguredWhitelist,
    MockIpReputation,
    FixedClock,
>;

/// Engine on in-memory providers, with handles to every mock.
pub struct Harness {
    pub engine: TestEngine,
    pub zones: MockZoneDirectory,
    pub history: MockHistoryStore,
    pub recorder: MockDetectionRecorder,
    pub alerts: MockAlertDispatcher,
    pub reputation: MockIpReputation,
}

impl Harness {
    /// Default configuration, clinic zone only.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// `config`, clinic zone only.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::build(config, vec![fixtures::clinic_zone()])
    }

    /// `config` and `zones`.
    pub fn build(config: EngineConfig, zones: Vec<WorkZone>) -> Self {
        geoguard_testing::init_tracing();

        let zones = MockZoneDirectory::with_zones(zones);
        let history = MockHistoryStore::with_clock(test_clock());
        let recorder = MockDetectionRecorder::new();
        let alerts = MockAlertDispatcher::new();
        let reputation = MockIpReputation::new();
        let whitelist = ConfiguredWhitelist::new(config.whitelist.clone());

        let env = EngineEnvironment::new(
            zones.clone(),
            history.clone(),
            recorder.clone(),
            alerts.clone(),
            whitelist,
            reputation.clone(),
            test_clock(),
        );
        let engine = LocationSecurityEngine::new(config, env).expect("valid configuration");

        Self {
            engine,
            zones,
            history,
            recorder,
            alerts,
            reputation,
        }
    }

    /// Evaluate without deadline or cancellation.
    pub async fn outcome(&self, request: &EvaluationRequest) -> EvaluationOutcome {
        self.engine
            .evaluate(request, &EvaluationContext::new())
            .await
            .expect("evaluation is not a contract violation")
    }

    /// Evaluate and require a verdict.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResult {
        match self.outcome(request).await {
            EvaluationOutcome::Decided(result) => result,
            EvaluationOutcome::Indeterminate(why) => panic!("unexpected indeterminate: {why}"),
        }
    }
}

/// The fixed test time.
pub fn now() -> DateTime<Utc> {
    test_clock().now()
}

/// Check-in request for `user`.
pub fn check_in(user: &str, sample: LocationSample) -> EvaluationRequest {
    EvaluationRequest::new(user, sample, AttendanceType::CheckIn)
}
