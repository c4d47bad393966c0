//! Ramp execution engine.
//!
//! Walks the concurrency levels of a [`RampPlan`] one step at a time, calling
//! the [`LoadDriver`] under a per-step cancellation token. At most one ramp
//! runs per engine; other callers wait on the execution lock.

use crate::driver::LoadDriver;
use crate::error::{CancelCause, RampError};
use bytes::Bytes;
use loadramp_core::{LoadSummary, RampPlan, RunResult, StepReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a ramp invocation ended.
#[derive(Debug)]
pub enum RampOutcome {
    /// Every step ran.
    Completed,
    /// The caller's token fired or the ramp deadline lapsed.
    Cancelled(RampError),
    /// A step produced an undecodable report.
    Failed(RampError),
}

/// Reports gathered by one ramp invocation and how it ended.
///
/// `reports` holds every step that produced a report, in order, whatever the
/// outcome.
#[derive(Debug)]
pub struct RampRun {
    pub reports: RunResult,
    pub outcome: RampOutcome,
}

impl RampRun {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RampOutcome::Completed)
    }

    pub fn error(&self) -> Option<&RampError> {
        match &self.outcome {
            RampOutcome::Completed => None,
            RampOutcome::Cancelled(err) | RampOutcome::Failed(err) => Some(err),
        }
    }

    pub fn into_parts(self) -> (RunResult, Option<RampError>) {
        let error = match self.outcome {
            RampOutcome::Completed => None,
            RampOutcome::Cancelled(err) | RampOutcome::Failed(err) => Some(err),
        };
        (self.reports, error)
    }

    /// The full result of a completed ramp, or the error that stopped it.
    pub fn into_result(self) -> Result<RunResult, RampError> {
        match self.into_parts() {
            (reports, None) => Ok(reports),
            (_, Some(err)) => Err(err),
        }
    }
}

pub struct RampEngine {
    driver: Arc<dyn LoadDriver>,
    execution: Mutex<()>,
}

impl RampEngine {
    pub fn new(driver: Arc<dyn LoadDriver>) -> Self {
        Self {
            driver,
            execution: Mutex::new(()),
        }
    }

    /// True while a ramp holds the execution lock.
    pub fn is_busy(&self) -> bool {
        self.execution.try_lock().is_err()
    }

    /// Execute `plan`, waiting for any ramp already in flight.
    ///
    /// Returns `Err` only for an invalid plan, in which case the driver is
    /// never called. Interruptions and decode failures come back in
    /// [`RampRun::outcome`] alongside the reports gathered so far.
    pub async fn run(
        &self,
        plan: &RampPlan,
        cancel: &CancellationToken,
    ) -> Result<RampRun, RampError> {
        plan.validate()?;
        self.check_peak(plan)?;

        let _guard = self.execution.lock().await;

        let ramp_deadline = plan.deadline().and_then(|d| after(Instant::now(), d));
        tracing::info!(run = plan.name(), steps = plan.step_count(), "ramp started: {}", plan);

        let mut reports = RunResult::new();
        let outcome = self
            .step_through(plan, cancel, ramp_deadline, &mut reports)
            .await;

        match &outcome {
            RampOutcome::Completed => {
                tracing::info!(run = plan.name(), steps = reports.len(), "ramp completed")
            }
            RampOutcome::Cancelled(err) | RampOutcome::Failed(err) => tracing::warn!(
                run = plan.name(),
                steps = reports.len(),
                "ramp stopped: {}",
                err
            ),
        }

        Ok(RampRun { reports, outcome })
    }

    /// Reject ramps whose top level exceeds what the driver accepts.
    fn check_peak(&self, plan: &RampPlan) -> Result<(), RampError> {
        let (Some(limit), Some(peak)) = (self.driver.max_concurrency(), plan.peak_concurrency())
        else {
            return Ok(());
        };
        if usize::try_from(peak).map_or(true, |peak| peak > limit) {
            return Err(RampError::Configuration(format!(
                "concurrency {} exceeds the driver limit of {}",
                peak, limit
            )));
        }
        Ok(())
    }

    async fn step_through(
        &self,
        plan: &RampPlan,
        cancel: &CancellationToken,
        ramp_deadline: Option<Instant>,
        reports: &mut RunResult,
    ) -> RampOutcome {
        for (index, concurrency) in plan.concurrency_levels().enumerate() {
            let step = index + 1;

            if !plan.step_delay().is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = deadline_elapsed(ramp_deadline) => {}
                    _ = tokio::time::sleep(plan.step_delay()) => {}
                }
            }

            if let Some(cause) = interruption(cancel, ramp_deadline) {
                return RampOutcome::Cancelled(RampError::Cancelled { step, cause });
            }

            tracing::info!(run = plan.name(), step, concurrency, "running step");

            let step_limit = plan.step_timeout().and_then(|t| after(Instant::now(), t));
            let step_deadline = match (step_limit, ramp_deadline) {
                (Some(step), Some(ramp)) => Some(step.min(ramp)),
                (step, ramp) => step.or(ramp),
            };
            let raw = self
                .drive(plan, concurrency, cancel.child_token(), step_deadline)
                .await;

            let summary = match LoadSummary::decode(&raw) {
                Ok(summary) => summary,
                Err(source) => return RampOutcome::Failed(RampError::Decode { step, source }),
            };
            tracing::debug!(
                step,
                concurrency,
                responses = summary.success_count,
                errors = summary.error_count,
                "step finished"
            );
            reports.push(StepReport::new(concurrency, plan.request().url(), summary));

            // The partial report of an interrupted step is kept.
            if let Some(cause) = interruption(cancel, ramp_deadline) {
                return RampOutcome::Cancelled(RampError::Cancelled { step, cause });
            }
        }

        RampOutcome::Completed
    }

    /// Call the driver, cancelling its token once `deadline` passes and
    /// waiting for the partial report it then returns.
    async fn drive(
        &self,
        plan: &RampPlan,
        concurrency: i64,
        step_cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Bytes {
        let level = usize::try_from(concurrency).unwrap_or(usize::MAX);
        let call = self.driver.run(plan.request(), level, step_cancel.clone());
        tokio::pin!(call);

        tokio::select! {
            raw = &mut call => raw,
            _ = deadline_elapsed(deadline) => {
                step_cancel.cancel();
                call.await
            }
        }
    }
}

/// `start + duration`, or `None` when that lies beyond what `Instant` can
/// represent; such a limit never fires.
fn after(start: Instant, duration: Duration) -> Option<Instant> {
    start.checked_add(duration)
}

/// Why the ramp must stop now, if it must.
fn interruption(cancel: &CancellationToken, ramp_deadline: Option<Instant>) -> Option<CancelCause> {
    if cancel.is_cancelled() {
        Some(CancelCause::Cancelled)
    } else if ramp_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        Some(CancelCause::DeadlineExceeded)
    } else {
        None
    }
}

/// Resolves at `deadline`; never resolves without one.
async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
