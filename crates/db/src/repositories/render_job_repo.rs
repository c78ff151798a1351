//! Repository for the `render_jobs` table.
//!
//! Terminal transitions go through `complete`/`fail` only. Both are
//! conditional updates guarded on the current status being non-terminal,
//! which is the single synchronization primitive closing the race between
//! the webhook and poll reconciliation paths. A zero-row update means the
//! job was already finalized by the other path.

use sqlx::PgPool;

use lucid_core::types::DbId;

use crate::models::render_job::{JobListQuery, RenderJob};
use crate::models::status::RenderJobStatus;

/// Column list for `render_jobs` queries.
const COLUMNS: &str = "\
    id, correlation_id, owner_id, dream_id, status_id, \
    artifact_path, provider_url, error_message, \
    unit_consumed, refunded, \
    created_at, completed_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides persistence operations for render jobs.
pub struct RenderJobRepo;

impl RenderJobRepo {
    /// Create a Pending job after a successful dispatch call.
    ///
    /// `unit_consumed` records whether a usage unit was spent for this job
    /// (it is `true` on the normal dispatch path; the flag drives the
    /// refund-once decision at finalization).
    pub async fn insert_pending(
        pool: &PgPool,
        owner_id: DbId,
        dream_id: DbId,
        correlation_id: &str,
        unit_consumed: bool,
    ) -> Result<RenderJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO render_jobs \
                 (correlation_id, owner_id, dream_id, status_id, unit_consumed) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(correlation_id)
            .bind(owner_id)
            .bind(dream_id)
            .bind(RenderJobStatus::Pending.id())
            .bind(unit_consumed)
            .fetch_one(pool)
            .await
    }

    /// Create a job directly in Failed status (audit row).
    ///
    /// Used for dispatch-time failures, which skip Pending entirely so the
    /// job never appears in flight: the dispatch call either never yielded
    /// a correlation id (`None`) or the usage-unit race was lost after one
    /// was assigned (`Some`).
    pub async fn insert_failed(
        pool: &PgPool,
        owner_id: DbId,
        dream_id: DbId,
        correlation_id: Option<&str>,
        error: &str,
    ) -> Result<RenderJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO render_jobs \
                 (correlation_id, owner_id, dream_id, status_id, error_message, completed_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(correlation_id)
            .bind(owner_id)
            .bind(dream_id)
            .bind(RenderJobStatus::Failed.id())
            .bind(error)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RenderJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM render_jobs WHERE id = $1");
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by the provider's correlation id.
    pub async fn find_by_correlation(
        pool: &PgPool,
        correlation_id: &str,
    ) -> Result<Option<RenderJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM render_jobs WHERE correlation_id = $1");
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(correlation_id)
            .fetch_optional(pool)
            .await
    }

    /// Move a job from Pending to Processing when the provider reports it
    /// running. Conditional on the current status so a late report cannot
    /// regress a terminal job. Returns `true` if the row transitioned.
    pub async fn mark_processing(
        pool: &PgPool,
        correlation_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE render_jobs \
             SET status_id = $2, updated_at = NOW() \
             WHERE correlation_id = $1 AND status_id = $3",
        )
        .bind(correlation_id)
        .bind(RenderJobStatus::Processing.id())
        .bind(RenderJobStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Terminal transition to Completed.
    ///
    /// Conditional on the job still being Pending or Processing. Returns
    /// the updated row when this call won the transition, or `None` when
    /// the job was already terminal (the other reconciliation path got
    /// there first) -- the caller must then perform no further side effects.
    pub async fn complete(
        pool: &PgPool,
        correlation_id: &str,
        artifact_path: &str,
        provider_url: Option<&str>,
    ) -> Result<Option<RenderJob>, sqlx::Error> {
        let query = format!(
            "UPDATE render_jobs \
             SET status_id = $2, artifact_path = $3, provider_url = $4, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE correlation_id = $1 AND status_id IN ($5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(correlation_id)
            .bind(RenderJobStatus::Completed.id())
            .bind(artifact_path)
            .bind(provider_url)
            .bind(RenderJobStatus::Pending.id())
            .bind(RenderJobStatus::Processing.id())
            .fetch_optional(pool)
            .await
    }

    /// Terminal transition to Failed.
    ///
    /// The `refunded` flag is computed inside the same conditional update
    /// (`unit_consumed AND refund_eligible`), so only the transition winner
    /// can observe a freshly-set flag and issue the single ledger refund.
    /// Returns `None` when the job was already terminal.
    pub async fn fail(
        pool: &PgPool,
        correlation_id: &str,
        error: &str,
        refund_eligible: bool,
    ) -> Result<Option<RenderJob>, sqlx::Error> {
        let query = format!(
            "UPDATE render_jobs \
             SET status_id = $2, error_message = $3, \
                 refunded = (unit_consumed AND $4), \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE correlation_id = $1 AND status_id IN ($5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(correlation_id)
            .bind(RenderJobStatus::Failed.id())
            .bind(error)
            .bind(refund_eligible)
            .bind(RenderJobStatus::Pending.id())
            .bind(RenderJobStatus::Processing.id())
            .fetch_optional(pool)
            .await
    }

    /// List a user's jobs, most recent first, with pagination.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        params: &JobListQuery,
    ) -> Result<Vec<RenderJob>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let query = format!(
            "SELECT {COLUMNS} FROM render_jobs \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
