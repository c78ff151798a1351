//! Client-driven status polling loop.
//!
//! While a job is outstanding the client polls the status-check operation
//! on a fixed interval. The loop stops on a terminal status, on explicit
//! cancellation (user left the screen), or on its bounded time budget.
//!
//! Giving up is strictly client-local: the authoritative job row is never
//! touched by this loop, because the external render and/or a pending
//! webhook may still complete it later. A timed-out loop therefore
//! reports the distinct [`PollOutcome::StillWorking`] ("check back
//! later"), never a fabricated failure.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use lucid_core::progress;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Poll loop tuning.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between status checks.
    pub interval: Duration,
    /// Upper time budget before the loop gives up client-side.
    pub max_duration: Duration,
    /// Typical render duration, feeding the heuristic progress estimate.
    pub expected_render_secs: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_duration: Duration::from_secs(300),
            expected_render_secs: progress::DEFAULT_EXPECTED_DURATION_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Probe seam
// ---------------------------------------------------------------------------

/// Status as seen by one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolledStatus {
    /// Queued or processing upstream.
    Running,
    /// The job finalized as Completed.
    Completed,
    /// The job finalized as Failed.
    Failed,
}

/// One status-check invocation.
///
/// The production probe calls the server's status-check operation, which
/// itself queries the provider and finalizes terminal jobs before
/// answering -- both reconciliation entry points share that one code path.
#[async_trait]
pub trait StatusProbe: Send {
    async fn check(&mut self) -> Result<PolledStatus, ProbeFailure>;
}

/// A failed status check (transport or server error). The loop logs it
/// and keeps polling: the poll loop is a bounded retry of the *query*,
/// never of the generation itself.
#[derive(Debug, thiserror::Error)]
#[error("Status check failed: {0}")]
pub struct ProbeFailure(pub String);

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How the poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Terminal success observed.
    Completed,
    /// Terminal failure observed.
    Failed,
    /// Time budget exhausted while the job was still in flight. The
    /// authoritative record is untouched and may still complete later.
    StillWorking,
    /// The caller cancelled the loop (advisory/local only; no effect on
    /// the external job or the authoritative record).
    Cancelled,
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Drives a [`StatusProbe`] until the job resolves or the budget runs out.
pub struct StatusPoller {
    config: PollConfig,
}

impl StatusPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    /// Run the loop. `on_progress` receives the heuristic estimate after
    /// every tick -- monotonically increasing and capped below 100 until a
    /// terminal status is observed, at which point 100 is reported.
    pub async fn run<P>(
        &self,
        mut probe: P,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(u8) + Send,
    ) -> PollOutcome
    where
        P: StatusProbe,
    {
        let started = tokio::time::Instant::now();
        let deadline = started + self.config.max_duration;
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; consume it
        // so the initial check happens one interval after submission.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Poll loop cancelled by caller");
                    return PollOutcome::Cancelled;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::info!(
                        budget_secs = self.config.max_duration.as_secs(),
                        "Poll budget exhausted; job may still finish upstream",
                    );
                    return PollOutcome::StillWorking;
                }
                _ = interval.tick() => {
                    match probe.check().await {
                        Ok(PolledStatus::Completed) => {
                            on_progress(100);
                            return PollOutcome::Completed;
                        }
                        Ok(PolledStatus::Failed) => {
                            return PollOutcome::Failed;
                        }
                        Ok(PolledStatus::Running) => {
                            let elapsed = started.elapsed().as_secs_f64();
                            on_progress(progress::estimate_percent(
                                elapsed,
                                self.config.expected_render_secs,
                            ));
                        }
                        Err(e) => {
                            // Transient query failure: keep polling.
                            tracing::warn!(error = %e, "Status check failed, will retry");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
