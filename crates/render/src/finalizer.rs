//! The completion finalizer: the single authorized terminal transition.
//!
//! Both reconciliation entry points (the provider webhook and the client
//! poll) converge here. Correctness against their race rests on the
//! conditional status update in the repository (`complete`/`fail` only
//! touch rows still Pending/Processing), not on any application lock: the
//! loser of the race affects zero rows and performs no further side
//! effects -- no re-refund, no duplicate notification.

use std::sync::Arc;

use sqlx::PgPool;

use lucid_core::quota::TIER_FREE;
use lucid_core::types::DbId;
use lucid_db::models::render_job::RenderJob;
use lucid_db::models::status::RenderJobStatus;
use lucid_db::repositories::{RenderJobRepo, UsageRepo, UserRepo};
use lucid_events::{EventBus, PlatformEvent, EVENT_VIDEO_COMPLETED, EVENT_VIDEO_FAILED};

use crate::storage::ArtifactStore;

/// Error recorded when the provider succeeded but our own persistence of
/// the artifact did not.
const ARTIFACT_PERSIST_FAILED: &str = "ArtifactPersistFailed";

/// Terminal outcome reported by a reconciliation path.
#[derive(Debug, Clone)]
pub enum TerminalOutcome {
    /// The provider finished rendering; the artifact lives at this
    /// (possibly time-limited) URL.
    Succeeded { output_url: String },
    /// The provider failed or cancelled the render.
    Failed { error: String },
}

/// What the finalizer did for this invocation.
#[derive(Debug)]
pub enum FinalizeOutcome {
    /// This call performed the terminal transition.
    Applied(RenderJob),
    /// The job was already terminal; this call was a pure no-op.
    AlreadyFinal,
    /// No job with this correlation id was ever dispatched (stale or
    /// foreign id) -- non-fatal.
    NotFound,
}

/// Move a job to its terminal state exactly once.
pub async fn finalize(
    pool: &PgPool,
    store: &dyn ArtifactStore,
    bus: &Arc<EventBus>,
    correlation_id: &str,
    outcome: TerminalOutcome,
) -> Result<FinalizeOutcome, sqlx::Error> {
    let Some(job) = RenderJobRepo::find_by_correlation(pool, correlation_id).await? else {
        tracing::info!(
            correlation_id,
            "Ignoring terminal report for unknown correlation id",
        );
        return Ok(FinalizeOutcome::NotFound);
    };

    // Fast path: the other reconciliation path already finalized. The
    // conditional updates below re-check this, so a race past the read is
    // still safe.
    if RenderJobStatus::from_id(job.status_id).is_some_and(|s| s.is_terminal()) {
        tracing::debug!(
            job_id = job.id,
            correlation_id,
            "Job already terminal, duplicate terminal report ignored",
        );
        return Ok(FinalizeOutcome::AlreadyFinal);
    }

    let refund_eligible = is_free_tier(pool, job.owner_id).await?;

    let transitioned = match outcome {
        TerminalOutcome::Succeeded { output_url } => {
            match store.persist(job.id, &output_url).await {
                Ok(artifact_path) => {
                    RenderJobRepo::complete(pool, correlation_id, &artifact_path, Some(&output_url))
                        .await?
                }
                Err(e) => {
                    // Terminal success upstream, but our storage step
                    // failed: the job must not stay stuck in flight.
                    tracing::error!(
                        job_id = job.id,
                        correlation_id,
                        error = %e,
                        "Artifact persistence failed, failing the job",
                    );
                    let message = format!("{ARTIFACT_PERSIST_FAILED}: {e}");
                    RenderJobRepo::fail(pool, correlation_id, &message, refund_eligible).await?
                }
            }
        }
        TerminalOutcome::Failed { error } => {
            RenderJobRepo::fail(pool, correlation_id, &error, refund_eligible).await?
        }
    };

    let Some(job) = transitioned else {
        // The conditional update affected zero rows: the other path won
        // between our read and our write.
        tracing::debug!(correlation_id, "Lost the terminal-transition race, no-op");
        return Ok(FinalizeOutcome::AlreadyFinal);
    };

    // Only the transition winner reaches this point, so each of the
    // following side effects happens exactly once per job.
    if job.refunded {
        let restored = UsageRepo::refund_one(pool, job.owner_id).await?;
        tracing::info!(
            job_id = job.id,
            owner_id = job.owner_id,
            restored,
            "Refunded usage credit for failed render",
        );
    }

    publish_outcome(pool, bus, &job).await?;

    Ok(FinalizeOutcome::Applied(job))
}

/// Whether the job owner is on the refundable (free) tier.
async fn is_free_tier(pool: &PgPool, owner_id: DbId) -> Result<bool, sqlx::Error> {
    Ok(UsageRepo::find_by_user(pool, owner_id)
        .await?
        .is_some_and(|account| account.tier == TIER_FREE))
}

/// Emit the single outcome event for the notification collaborator.
async fn publish_outcome(
    pool: &PgPool,
    bus: &Arc<EventBus>,
    job: &RenderJob,
) -> Result<(), sqlx::Error> {
    let owner_display_hint = UserRepo::find_by_id(pool, job.owner_id)
        .await?
        .map(|u| u.display_name)
        .unwrap_or_default();

    let (event_type, detail) = if job.status_id == RenderJobStatus::Completed.id() {
        (
            EVENT_VIDEO_COMPLETED,
            serde_json::json!({
                "dream_id": job.dream_id,
                "owner_display_hint": owner_display_hint,
                "artifact_path": job.artifact_path,
            }),
        )
    } else {
        (
            EVENT_VIDEO_FAILED,
            serde_json::json!({
                "dream_id": job.dream_id,
                "owner_display_hint": owner_display_hint,
                "error": job.error_message,
            }),
        )
    };

    bus.publish(
        PlatformEvent::new(event_type)
            .with_source("render_job", job.id)
            .with_actor(job.owner_id)
            .with_payload(detail),
    );
    Ok(())
}
