//! Prometheus metrics for evaluations, verdicts and dependencies.
//!
//! Recording always goes through the `metrics` facade, so nothing is
//! exported unless the host installs a recorder. [`MetricsServer`] installs
//! the Prometheus one and renders the scrape payload.
//!
//! # Example
//!
//! ```rust,no_run
//! use geoguard_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(payload) = server.render() {
//!     println!("{payload}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Evaluations by terminal outcome.
pub const EVALUATIONS_TOTAL: &str = "geoguard_evaluations_total";
/// Verdicts by action.
pub const VERDICTS_TOTAL: &str = "geoguard_verdicts_total";
/// Triggered findings by detector.
pub const DETECTOR_TRIGGERS_TOTAL: &str = "geoguard_detector_triggers_total";
/// Degraded dependency calls by dependency and failure kind.
pub const DEPENDENCY_FAILURES_TOTAL: &str = "geoguard_dependency_failures_total";
/// End-to-end evaluation latency.
pub const EVALUATION_DURATION_SECONDS: &str = "geoguard_evaluation_duration_seconds";
/// Time spent waiting for the per-user lock.
pub const LOCK_WAIT_DURATION_SECONDS: &str = "geoguard_lock_wait_duration_seconds";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create an exporter for the given scrape address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder that is already installed is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the scrape endpoint is meant to be served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        EVALUATIONS_TOTAL,
        "Evaluations completed, by outcome (whitelisted, invalid, blocked, analyzed, indeterminate)"
    );
    describe_counter!(VERDICTS_TOTAL, "Verdicts issued, by action");
    describe_counter!(DETECTOR_TRIGGERS_TOTAL, "Triggered detector findings, by detector");
    describe_counter!(
        DEPENDENCY_FAILURES_TOTAL,
        "Dependency calls that timed out or failed and fell back, by dependency and kind"
    );
    describe_histogram!(
        EVALUATION_DURATION_SECONDS,
        "Time taken by one evaluation"
    );
    describe_histogram!(
        LOCK_WAIT_DURATION_SECONDS,
        "Time spent waiting for the per-user history lock"
    );
}

/// Evaluation metrics recorder.
pub struct EvaluationMetrics;

impl EvaluationMetrics {
    /// Record a finished evaluation.
    pub fn record_outcome(outcome: &'static str, duration: Duration) {
        counter!(EVALUATIONS_TOTAL, "outcome" => outcome).increment(1);
        histogram!(EVALUATION_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    /// Record an issued verdict.
    pub fn record_verdict(action: &'static str) {
        counter!(VERDICTS_TOTAL, "action" => action).increment(1);
    }

    /// Record a triggered detector.
    pub fn record_trigger(detector: &'static str) {
        counter!(DETECTOR_TRIGGERS_TOTAL, "detector" => detector).increment(1);
    }
}

/// Dependency metrics recorder.
pub struct DependencyMetrics;

impl DependencyMetrics {
    /// Record a dependency call that fell back.
    ///
    /// `kind` is `timeout` or `error`.
    pub fn record_failure(dependency: &'static str, kind: &'static str) {
        counter!(DEPENDENCY_FAILURES_TOTAL, "dependency" => dependency, "kind" => kind)
            .increment(1);
    }
}

/// Lock metrics recorder.
pub struct LockMetrics;

impl LockMetrics {
    /// Record how long an acquisition waited, successful or not.
    pub fn record_wait(waited: Duration) {
        histogram!(LOCK_WAIT_DURATION_SECONDS).record(waited.as_secs_f64());
    }
}
