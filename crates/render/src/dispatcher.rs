//! Render dispatch: provider submission plus usage accounting.
//!
//! Ordering is the heart of the contract: the usage unit is consumed only
//! *after* the provider has accepted the job (a dispatch-time failure must
//! never cost a paid unit), and the job row is written only after both
//! steps resolved, so a job never appears in flight unless the provider
//! actually has it.

use sqlx::PgPool;

use lucid_core::types::DbId;
use lucid_db::models::render_job::RenderJob;
use lucid_db::repositories::{RenderJobRepo, UsageError, UsageRepo};

use crate::backend::{RenderBackend, RenderRequest};

/// Failure reason recorded on the audit row when the usage-unit race is
/// lost after dispatch.
const UNITS_EXHAUSTED_MESSAGE: &str = "UnitsExhausted: usage unit spent by a concurrent request";

/// Errors surfaced synchronously to the generation caller.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The provider rejected or never received the submission. No usage
    /// unit was consumed; fully recoverable by retrying the request.
    #[error("Generation dispatch failed: {0}")]
    DispatchFailed(String),

    /// The provider accepted the job but a concurrent request consumed the
    /// last usage unit first. The external job was cancelled best-effort.
    #[error("No usage units remaining")]
    UnitsExhausted,

    /// The caller has no usage account (eligibility was not checked).
    #[error("No usage account for user {0}")]
    UnknownAccount(DbId),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Submit a generation request and create the job record.
///
/// Preconditions: the caller has already passed the eligibility check.
/// On success the returned job is Pending with `unit_consumed = true` and
/// carries the provider's correlation id for polling.
pub async fn dispatch(
    pool: &PgPool,
    backend: &dyn RenderBackend,
    user_id: DbId,
    dream_id: DbId,
    request: &RenderRequest,
) -> Result<RenderJob, DispatchError> {
    // 1. Submit upstream. A failure here has no side effects to undo: the
    //    audit row skips Pending entirely.
    let accepted = match backend.submit(request).await {
        Ok(accepted) => accepted,
        Err(e) => {
            let reason = e.to_string();
            tracing::warn!(user_id, dream_id, error = %reason, "Render dispatch failed");
            RenderJobRepo::insert_failed(pool, user_id, dream_id, None, &reason).await?;
            return Err(DispatchError::DispatchFailed(reason));
        }
    };

    // 2. The provider has the job; only now spend the unit.
    match UsageRepo::consume_one(pool, user_id).await {
        Ok(()) => {}
        Err(UsageError::InsufficientUnits) => {
            // Lost the race to a concurrent request from the same account.
            // Cancellation upstream is best-effort; the provider may not
            // honor it.
            if let Err(e) = backend.cancel(&accepted.correlation_id).await {
                tracing::warn!(
                    user_id,
                    correlation_id = %accepted.correlation_id,
                    error = %e,
                    "Best-effort cancel after lost usage race was not accepted",
                );
            }
            RenderJobRepo::insert_failed(
                pool,
                user_id,
                dream_id,
                Some(&accepted.correlation_id),
                UNITS_EXHAUSTED_MESSAGE,
            )
            .await?;
            return Err(DispatchError::UnitsExhausted);
        }
        Err(UsageError::UnknownAccount(id)) => return Err(DispatchError::UnknownAccount(id)),
        Err(UsageError::Database(e)) => return Err(DispatchError::Database(e)),
    }

    // 3. Both steps held: record the in-flight job.
    let job = RenderJobRepo::insert_pending(
        pool,
        user_id,
        dream_id,
        &accepted.correlation_id,
        true,
    )
    .await?;

    tracing::info!(
        job_id = job.id,
        user_id,
        dream_id,
        correlation_id = %accepted.correlation_id,
        "Render job dispatched",
    );

    Ok(job)
}
