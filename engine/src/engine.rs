//! The location security engine.
//!
//! One call to [`LocationSecurityEngine::evaluate`] runs the whole pipeline
//! for one check-in or check-out:
//!
//! ```text
//! Start ─► Whitelisted? ──yes──► [allow]
//!            │no
//!            ▼
//!          Valid? ──no──► [invalid: block + review]
//!            │yes
//!            ▼
//!          per-user lock ─► block status ┐
//!                           zones        ├─ awaited together
//!                           last fix     │
//!                           IP reputation┘
//!            │
//!          Blocked? ──yes──► [active block]
//!            │no
//!            ▼
//!          Geofence ─► Detectors ─► Aggregate ─► Policy ─► History + (Block) ─► unlock
//!                                                                                 │
//!                                                                      Record ─► (Alert)
//! ```
//!
//! The per-user lock covers the last-fix read through the history and block
//! writes; the audit record and the alert are written after it is released.
//!
//! Everything up to the policy decision can be interrupted by the caller's
//! [`EvaluationContext`]; everything after it is best-effort persistence
//! that never changes the verdict.

use crate::context::EvaluationContext;
use crate::environment::EngineEnvironment;
use crate::error::{EngineError, Result};
use crate::outcome::{EvaluationOutcome, EvaluationRequest, EvaluationResult, Indeterminate, Stage};
use crate::providers::{
    AlertDispatcher, DetectionRecorder, HistoryStore, IpReputation, WhitelistChecker,
    WorkZoneDirectory,
};
use chrono::{DateTime, Utc};
use geoguard_core::config::EngineConfig;
use geoguard_core::detectors::{
    DetectionContext, DetectionFinding, DetectorPipeline, HistoryContext, ReputationSignal,
};
use geoguard_core::environment::Clock;
use geoguard_core::geofence::{GeofenceResult, resolve_geofence};
use geoguard_core::model::{LastKnownFix, LocationSample, UserId, WorkZone};
use geoguard_core::policy::{Action, PolicyEngine, SecurityVerdict};
use geoguard_core::record::{DetectionRecord, RecordId, TerminalState};
use geoguard_core::risk::{PenaltyTerm, RiskAggregator};
use geoguard_core::validation::{describe_issues, validate_sample};
use geoguard_core::whitelist::WhitelistMatch;
use geoguard_runtime::locks::{KeyedLockGuard, KeyedLocks};
use geoguard_runtime::metrics::{DependencyMetrics, EvaluationMetrics};
use geoguard_runtime::retry::RetryPolicy;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const WHITELIST: &str = "whitelist";
const ZONE_DIRECTORY: &str = "zone_directory";
const HISTORY: &str = "history";
const HISTORY_LOCK: &str = "history_lock";
const RECORDER: &str = "recorder";
const ALERTS: &str = "alerts";
const IP_REPUTATION: &str = "ip_reputation";

/// Delay before the first lock retry.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(25);

/// What the history store said about the previous fix.
enum PreviousFix {
    Unavailable,
    Missing,
    Found(LastKnownFix),
}

impl PreviousFix {
    const fn as_context(&self) -> HistoryContext<'_> {
        match self {
            Self::Unavailable => HistoryContext::Unavailable,
            Self::Missing => HistoryContext::FirstObservation,
            Self::Found(fix) => HistoryContext::Previous(fix),
        }
    }
}

/// A verdict that still has to be persisted.
struct Decision {
    verdict: SecurityVerdict,
    findings: Vec<DetectionFinding>,
    terminal_state: TerminalState,
    evaluated_at: DateTime<Utc>,
    update_history: bool,
    lock: Option<KeyedLockGuard>,
}

impl Decision {
    fn short_circuit(
        verdict: SecurityVerdict,
        terminal_state: TerminalState,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            verdict,
            findings: Vec::new(),
            terminal_state,
            evaluated_at,
            update_history: false,
            lock: None,
        }
    }
}

/// Real-time location integrity and attendance fraud engine.
///
/// Safe to share between tasks (wrap it in an `Arc`). Evaluations for
/// different users run fully in parallel; evaluations for the same user are
/// serialized around their read-last-fix / write-new-fix sequence.
///
/// # Example
///
/// ```ignore
/// let engine = LocationSecurityEngine::new(config, env)?;
/// let request = EvaluationRequest::new("u-42", sample, AttendanceType::CheckIn);
///
/// match engine.evaluate(&request, &EvaluationContext::new()).await? {
///     EvaluationOutcome::Decided(result) => respond(result.verdict),
///     EvaluationOutcome::Indeterminate(why) => retry_later(why),
/// }
/// ```
pub struct LocationSecurityEngine<Z, H, R, A, W, I, C>
where
    Z: WorkZoneDirectory + Clone,
    H: HistoryStore + Clone,
    R: DetectionRecorder + Clone,
    A: AlertDispatcher + Clone,
    W: WhitelistChecker + Clone,
    I: IpReputation + Clone,
    C: Clock + Clone,
{
    env: EngineEnvironment<Z, H, R, A, W, I, C>,
    config: EngineConfig,
    pipeline: DetectorPipeline,
    aggregator: RiskAggregator,
    policy: PolicyEngine,
    locks: KeyedLocks,
    lock_retry: RetryPolicy,
}

impl<Z, H, R, A, W, I, C> LocationSecurityEngine<Z, H, R, A, W, I, C>
where
    Z: WorkZoneDirectory + Clone,
    H: HistoryStore + Clone,
    R: DetectionRecorder + Clone,
    A: AlertDispatcher + Clone,
    W: WhitelistChecker + Clone,
    I: IpReputation + Clone,
    C: Clock + Clone,
{
    /// Build an engine with the standard eight-detector pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfiguration`] if `config` fails
    /// validation.
    pub fn new(config: EngineConfig, env: EngineEnvironment<Z, H, R, A, W, I, C>) -> Result<Self> {
        config.validate()?;

        let lock_retry = RetryPolicy::builder()
            .max_retries(config.locking.retries)
            .initial_delay(LOCK_RETRY_DELAY)
            .max_delay(config.locking.acquire_timeout())
            .build();

        Ok(Self {
            aggregator: RiskAggregator::from_config(&config),
            policy: PolicyEngine::new(config.policy),
            pipeline: DetectorPipeline::standard(),
            locks: KeyedLocks::new(),
            lock_retry,
            config,
            env,
        })
    }

    /// Replace the detector pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: DetectorPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// The configuration snapshot in use.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The collaborators in use.
    #[must_use]
    pub const fn environment(&self) -> &EngineEnvironment<Z, H, R, A, W, I, C> {
        &self.env
    }

    /// Evaluate one check-in or check-out.
    ///
    /// Business outcomes (allowed, warned, flagged, blocked, invalid input)
    /// are all [`EvaluationOutcome::Decided`]. Cancellation or an expired
    /// deadline before the policy decision gives
    /// [`EvaluationOutcome::Indeterminate`], which must never be read as
    /// permission.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoDetectors`] if the pipeline is empty. No
    /// other condition is an error: every dependency failure falls back to
    /// its safe default.
    #[tracing::instrument(
        skip_all,
        fields(user_id = %request.user_id, attendance = %request.attendance_type)
    )]
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        ctx: &EvaluationContext,
    ) -> Result<EvaluationOutcome> {
        if self.pipeline.is_empty() {
            return Err(EngineError::NoDetectors);
        }

        let started = Instant::now();
        let outcome = match self.decide(request, ctx).await {
            Ok(decision) => EvaluationOutcome::Decided(self.commit(request, decision).await),
            Err(stopped) => {
                warn!(
                    user_id = %request.user_id,
                    stage = %stopped.stage,
                    reason = ?stopped.reason,
                    "Evaluation indeterminate"
                );
                EvaluationOutcome::Indeterminate(stopped)
            }
        };

        let label = match &outcome {
            EvaluationOutcome::Decided(result) => result.terminal_state.label(),
            EvaluationOutcome::Indeterminate(_) => "indeterminate",
        };
        EvaluationMetrics::record_outcome(label, started.elapsed());

        Ok(outcome)
    }

    /// Everything up to and including the policy decision.
    async fn decide(
        &self,
        request: &EvaluationRequest,
        ctx: &EvaluationContext,
    ) -> std::result::Result<Decision, Indeterminate> {
        let user_id = &request.user_id;
        let sample = &request.sample;

        // 1. Operator override
        if let Some(matched) = ctx.guard(Stage::Whitelist, self.whitelisted(request)).await? {
            info!(user_id = %user_id, matched = %matched, "Whitelisted, detection skipped");
            return Ok(Decision::short_circuit(
                PolicyEngine::whitelisted(&matched),
                TerminalState::Whitelisted { matched },
                self.env.clock.now(),
            ));
        }

        // 2. Pre-validation
        if let Some(stopped) = ctx.interrupted(Stage::Validation) {
            return Err(stopped);
        }
        let issues = validate_sample(sample);
        if !issues.is_empty() {
            warn!(
                user_id = %user_id,
                issues = %describe_issues(&issues),
                "Rejected invalid location sample"
            );
            return Ok(Decision::short_circuit(
                PolicyEngine::invalid_input(&issues),
                TerminalState::InvalidInput { issues },
                self.env.clock.now(),
            ));
        }

        // 3. Serialize history access for this user
        let lock = ctx.guard(Stage::Lock, self.lock_history(user_id)).await?;
        let evaluated_at = self.env.clock.now();

        // 4. Independent reads
        let has_lock = lock.is_some();
        let (blocked, zones, previous, reputation) = ctx
            .guard(Stage::BlockStatus, async {
                tokio::join!(
                    self.block_status(user_id),
                    self.active_zones(),
                    self.previous_fix(user_id, has_lock),
                    self.ip_reputation(sample),
                )
            })
            .await?;

        if let Some(remaining) = blocked {
            info!(
                user_id = %user_id,
                remaining_secs = remaining.as_secs(),
                "User is inside a block window"
            );
            return Ok(Decision {
                verdict: PolicyEngine::active_block(remaining),
                findings: Vec::new(),
                terminal_state: TerminalState::ActiveBlock { remaining },
                evaluated_at,
                update_history: true,
                lock,
            });
        }

        // 5. Geofence
        if let Some(stopped) = ctx.interrupted(Stage::Geofence) {
            return Err(stopped);
        }
        let geofence = zones.map_or_else(
            || GeofenceResult::no_zone("work zone directory unavailable"),
            |zones| {
                resolve_geofence(
                    sample.coordinate(),
                    sample.accuracy_meters,
                    &zones,
                    request.shift_id.as_deref(),
                )
            },
        );

        // 6. Detectors
        if let Some(stopped) = ctx.interrupted(Stage::Detection) {
            return Err(stopped);
        }
        let detection_ctx = DetectionContext::new(&self.config, previous.as_context())
            .with_ip_reputation(reputation.as_ref());
        let findings = self.pipeline.run(sample, &detection_ctx);
        for finding in findings.iter().filter(|f| f.triggered) {
            EvaluationMetrics::record_trigger(finding.detector.name());
        }

        // 7. Aggregate
        if let Some(stopped) = ctx.interrupted(Stage::Aggregation) {
            return Err(stopped);
        }
        let penalties: Vec<PenaltyTerm> = geofence
            .outside_reason()
            .map(|reason| PenaltyTerm::outside_zone(self.config.outside_zone_penalty, reason))
            .into_iter()
            .collect();
        let assessment = self
            .aggregator
            .aggregate(&findings, &self.config.weights, &penalties);

        // 8. Policy
        if let Some(stopped) = ctx.interrupted(Stage::Policy) {
            return Err(stopped);
        }
        let verdict = self.policy.decide(assessment, geofence);

        Ok(Decision {
            verdict,
            findings,
            terminal_state: TerminalState::Analyzed,
            evaluated_at,
            update_history: true,
            lock,
        })
    }

    /// Persist a decision. Never fails and never changes the verdict.
    async fn commit(&self, request: &EvaluationRequest, decision: Decision) -> EvaluationResult {
        let Decision {
            verdict,
            findings,
            terminal_state,
            evaluated_at,
            update_history,
            lock,
        } = decision;
        let user_id = &request.user_id;

        let record = DetectionRecord {
            user_id: user_id.clone(),
            attendance_type: request.attendance_type,
            shift_id: request.shift_id.clone(),
            sample: request.sample.clone(),
            findings,
            verdict,
            terminal_state,
            evaluated_at,
        };

        // Both writes complete while the user's lock is held.
        let opens_block = record.verdict.action == Action::Block
            && !record.verdict.block_duration.is_zero()
            && matches!(record.terminal_state, TerminalState::Analyzed);
        tokio::join!(
            async {
                if update_history {
                    self.update_history(user_id, &request.sample, evaluated_at).await;
                }
            },
            async {
                if opens_block {
                    self.open_block(user_id, &record.verdict).await;
                }
            }
        );
        drop(lock);

        let record_id = self.persist(&record).await;

        let verdict = &record.verdict;
        if verdict.requires_escalation() {
            self.alert(user_id, &record, record_id.as_ref()).await;
        }

        EvaluationMetrics::record_verdict(verdict.action.as_str());
        info!(
            user_id = %user_id,
            outcome = record.terminal_state.label(),
            action = %verdict.action,
            risk_level = %verdict.risk_assessment.risk_level,
            score = verdict.risk_assessment.total_score,
            within_zone = verdict.geofence_result.within_zone,
            record_id = record_id.as_ref().map(RecordId::as_str),
            "Location evaluated"
        );

        let DetectionRecord {
            findings,
            verdict,
            terminal_state,
            evaluated_at,
            ..
        } = record;
        EvaluationResult {
            verdict,
            findings,
            terminal_state,
            record_id,
            evaluated_at,
        }
    }

    async fn whitelisted(&self, request: &EvaluationRequest) -> Option<WhitelistMatch> {
        let sample = &request.sample;
        let lookup = self.env.whitelist.is_whitelisted(
            &request.user_id,
            sample.device_id(),
            sample.ip_address(),
            sample,
        );
        match bounded(WHITELIST, self.config.timeouts.whitelist(), lookup).await {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "Whitelist lookup failed, treating request as not whitelisted");
                None
            }
        }
    }

    async fn lock_history(&self, user_id: &UserId) -> Option<KeyedLockGuard> {
        match self
            .locks
            .acquire_with_retry(
                user_id.as_str(),
                self.config.locking.acquire_timeout(),
                &self.lock_retry,
            )
            .await
        {
            Ok(guard) => Some(guard),
            Err(e) => {
                let kind = if e.is_timeout() { "timeout" } else { "error" };
                DependencyMetrics::record_failure(HISTORY_LOCK, kind);
                let err = EngineError::LockContention {
                    user_id: user_id.to_string(),
                };
                warn!(error = %err, cause = %e, "Proceeding without history");
                None
            }
        }
    }

    async fn block_status(&self, user_id: &UserId) -> Option<Duration> {
        let lookup = self.env.history.is_blocked(user_id);
        match bounded(HISTORY, self.config.timeouts.history(), lookup).await {
            Ok(remaining) => remaining.filter(|r| !r.is_zero()),
            Err(e) => {
                warn!(error = %e, "Block status unavailable, treating user as not blocked");
                None
            }
        }
    }

    async fn active_zones(&self) -> Option<Vec<WorkZone>> {
        let lookup = self.env.zones.active_zones();
        match bounded(ZONE_DIRECTORY, self.config.timeouts.zone_directory(), lookup).await {
            Ok(zones) => Some(zones),
            Err(e) => {
                warn!(error = %e, "Work zones unavailable, treating sample as outside every zone");
                None
            }
        }
    }

    async fn previous_fix(&self, user_id: &UserId, has_lock: bool) -> PreviousFix {
        if !has_lock {
            return PreviousFix::Unavailable;
        }
        let lookup = self.env.history.last_fix(user_id);
        match bounded(HISTORY, self.config.timeouts.history(), lookup).await {
            Ok(Some(fix)) => PreviousFix::Found(fix),
            Ok(None) => PreviousFix::Missing,
            Err(e) => {
                warn!(error = %e, "Last fix unavailable, running without history");
                PreviousFix::Unavailable
            }
        }
    }

    async fn ip_reputation(&self, sample: &LocationSample) -> Option<ReputationSignal> {
        let ip = sample.ip_address()?;
        let lookup = self.env.reputation.lookup(ip);
        match bounded(IP_REPUTATION, self.config.timeouts.reputation(), lookup).await {
            Ok(signal) => Some(signal),
            Err(e) => {
                debug!(error = %e, ip = %ip, "IP reputation unavailable");
                None
            }
        }
    }

    async fn persist(&self, record: &DetectionRecord) -> Option<RecordId> {
        let write = self.env.recorder.record(record);
        match bounded(RECORDER, self.config.timeouts.recorder(), write).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(
                    error = %e,
                    user_id = %record.user_id,
                    action = %record.verdict.action,
                    "Failed to persist detection record"
                );
                None
            }
        }
    }

    async fn update_history(&self, user_id: &UserId, sample: &LocationSample, at: DateTime<Utc>) {
        let write = self.env.history.update_fix(user_id, sample, at);
        if let Err(e) = bounded(HISTORY, self.config.timeouts.history(), write).await {
            warn!(error = %e, user_id = %user_id, "Failed to update last known fix");
        }
    }

    async fn open_block(&self, user_id: &UserId, verdict: &SecurityVerdict) {
        let write = self
            .env
            .history
            .set_block(user_id, verdict.block_duration, &verdict.reason);
        match bounded(HISTORY, self.config.timeouts.history(), write).await {
            Ok(()) => info!(
                user_id = %user_id,
                block_secs = verdict.block_duration.as_secs(),
                "Block window opened"
            ),
            Err(e) => warn!(error = %e, user_id = %user_id, "Failed to open block window"),
        }
    }

    async fn alert(&self, user_id: &UserId, record: &DetectionRecord, record_id: Option<&RecordId>) {
        let send = self
            .env
            .alerts
            .dispatch(user_id, &record.verdict, record, record_id);
        if let Err(e) = bounded(ALERTS, self.config.timeouts.alert(), send).await {
            warn!(error = %e, user_id = %user_id, "Failed to dispatch alert");
        }
    }
}

/// Await `fut` for at most `limit`, counting failures per dependency.
async fn bounded<T, F>(dependency: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            DependencyMetrics::record_failure(dependency, "error");
            Err(err)
        }
        Err(_) => {
            DependencyMetrics::record_failure(dependency, "timeout");
            Err(EngineError::Timeout {
                dependency: dependency.to_string(),
            })
        }
    }
}

#[cfg(all(test, feature = "test-utils"))]
#[allow(clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::mocks::{
        MockAlertDispatcher, MockDetectionRecorder, MockHistoryStore, MockIpReputation,
        MockZoneDirectory,
    };
    use crate::outcome::EvaluationOutcome;
    use crate::providers::ConfiguredWhitelist;
    use geoguard_core::config::{LockingConfig, RiskThresholds};
    use geoguard_core::detectors::{DetectorKind, INSUFFICIENT_DATA};
    use geoguard_core::model::AttendanceType;
    use geoguard_testing::mocks::FixedClock;
    use geoguard_testing::{fixtures, test_clock};

    type TestEngine = LocationSecurityEngine<
        MockZoneDirectory,
        MockHistoryStore,
        MockDetectionRecorder,
        MockAlertDispatcher,
        ConfiguredWhitelist,
        MockIpReputation,
        FixedClock,
    >;

    fn env(
        history: MockHistoryStore,
    ) -> EngineEnvironment<
        MockZoneDirectory,
        MockHistoryStore,
        MockDetectionRecorder,
        MockAlertDispatcher,
        ConfiguredWhitelist,
        MockIpReputation,
        FixedClock,
    > {
        EngineEnvironment::new(
            MockZoneDirectory::with_zones(vec![fixtures::clinic_zone()]),
            history,
            MockDetectionRecorder::new(),
            MockAlertDispatcher::new(),
            ConfiguredWhitelist::default(),
            MockIpReputation::new(),
            test_clock(),
        )
    }

    fn engine(config: EngineConfig) -> TestEngine {
        LocationSecurityEngine::new(config, env(MockHistoryStore::with_clock(test_clock()))).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EngineConfig::default().with_thresholds(RiskThresholds {
            medium: 80.0,
            high: 70.0,
            critical: 90.0,
        });
        let result = LocationSecurityEngine::new(config, env(MockHistoryStore::new()));
        assert!(matches!(
            result.err(),
            Some(EngineError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_a_contract_violation() {
        let engine = engine(EngineConfig::default()).with_pipeline(DetectorPipeline::new());
        let request = EvaluationRequest::new(
            "u-1",
            fixtures::clean_sample(test_clock().now()),
            AttendanceType::CheckIn,
        );

        let err = engine
            .evaluate(&request, &EvaluationContext::new())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::NoDetectors);
    }

    #[tokio::test]
    async fn test_contended_lock_runs_without_history() {
        let engine = engine(EngineConfig::default().with_locking(LockingConfig {
            acquire_timeout_ms: 20,
            retries: 0,
        }));
        let now = test_clock().now();
        let user = UserId::new("u-1");
        engine
            .environment()
            .history
            .seed_fix(&user, fixtures::sample_at(fixtures::far_away(), now - chrono::Duration::minutes(5)))
            .unwrap();

        let held = engine
            .locks
            .acquire(user.as_str(), Duration::from_secs(1))
            .await
            .unwrap();

        let request = EvaluationRequest::new(user.clone(), fixtures::clean_sample(now), AttendanceType::CheckIn);
        let result = engine
            .evaluate(&request, &EvaluationContext::new())
            .await
            .unwrap()
            .into_decided()
            .unwrap();
        drop(held);

        let travel = result.finding(DetectorKind::ImpossibleTravel).unwrap();
        assert!(!travel.triggered);
        assert_eq!(travel.evidence, vec![INSUFFICIENT_DATA.to_string()]);

        // Last write wins even without the lock.
        let stored = engine.environment().history.fix_for(&user).unwrap().unwrap();
        assert_eq!(stored.coordinate(), fixtures::CLINIC_CENTER);
    }

    #[tokio::test]
    async fn test_short_circuit_keeps_findings_empty() {
        let engine = engine(EngineConfig::default());
        let request = EvaluationRequest::new(
            "u-1",
            fixtures::sample_at(
                geoguard_core::model::Coordinate::new(120.0, 10.0),
                test_clock().now(),
            ),
            AttendanceType::CheckOut,
        );

        let outcome = engine
            .evaluate(&request, &EvaluationContext::new())
            .await
            .unwrap();
        let EvaluationOutcome::Decided(result) = outcome else {
            panic!("expected a decided outcome");
        };
        assert!(result.findings.is_empty());
        assert!(matches!(result.terminal_state, TerminalState::InvalidInput { .. }));
        assert_eq!(engine.environment().history.update_count(), 0);
    }
}
