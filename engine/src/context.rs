//! Caller-supplied cancellation and deadline for one evaluation.

use crate::outcome::{Indeterminate, Stage};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token and optional deadline for one evaluation.
///
/// The engine checks the context before every stage up to the policy
/// decision and races every dependency call against it. Once the verdict
/// exists the context is no longer consulted, so a late cancellation never
/// loses the audit record.
///
/// # Example
///
/// ```
/// use geoguard_engine::EvaluationContext;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = EvaluationContext::new().with_timeout(Duration::from_secs(5));
/// let token = ctx.token();
/// assert!(!ctx.is_cancelled());
/// token.cancel();
/// assert!(ctx.is_cancelled());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl EvaluationContext {
    /// Context that is never cancelled and has no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing token, typically a child of a request-scoped one.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Give up at `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Give up `timeout` from now.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// Clone of the token, for cancelling from elsewhere.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Indeterminate outcome for `stage` if the evaluation must stop now.
    #[must_use]
    pub fn interrupted(&self, stage: Stage) -> Option<Indeterminate> {
        if self.token.is_cancelled() {
            return Some(Indeterminate::cancelled(stage));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Some(Indeterminate::deadline_exceeded(stage))
            }
            _ => None,
        }
    }

    /// Run `fut` unless the evaluation is cancelled or out of time first.
    ///
    /// # Errors
    ///
    /// Returns [`Indeterminate`] tagged with `stage` when the token fires or
    /// the deadline passes before `fut` completes. `fut` is dropped.
    pub async fn guard<F>(&self, stage: Stage, fut: F) -> Result<F::Output, Indeterminate>
    where
        F: Future,
    {
        if let Some(stopped) = self.interrupted(stage) {
            return Err(stopped);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Indeterminate::cancelled(stage)),
            () = deadline => Err(Indeterminate::deadline_exceeded(stage)),
            output = fut => Ok(output),
        }
    }
}
