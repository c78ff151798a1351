//! Repository for the `usage_accounts` table (usage ledger).
//!
//! `consume_one` and `refund_one` are single atomic conditional updates
//! scoped to one user's row (never read-then-write), so two concurrent
//! generation requests from the same account (e.g. two devices) cannot
//! over-spend the last unit.

use sqlx::PgPool;

use lucid_core::quota::{self, Eligibility, QuotaStatus, TIER_FREE, TIER_SUBSCRIBER};
use lucid_core::types::{DbId, Timestamp};

use crate::models::usage::UsageAccount;

/// Column list for `usage_accounts` queries.
const COLUMNS: &str = "\
    user_id, tier, credits_remaining, videos_used_this_period, \
    quota_limit, period_resets_at, updated_at";

/// Errors from ledger write operations.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// The conditional guard failed at commit time: no credits left (free)
    /// or quota exhausted (subscriber).
    #[error("No usage units remaining")]
    InsufficientUnits,

    /// No ledger row exists for this user.
    #[error("No usage account for user {0}")]
    UnknownAccount(DbId),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Provides accounting operations for usage units.
pub struct UsageRepo;

impl UsageRepo {
    /// Create a ledger row for a user.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        tier: &str,
        credits_remaining: i32,
        quota_limit: i32,
        period_resets_at: Option<Timestamp>,
    ) -> Result<UsageAccount, sqlx::Error> {
        let query = format!(
            "INSERT INTO usage_accounts \
                 (user_id, tier, credits_remaining, quota_limit, period_resets_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UsageAccount>(&query)
            .bind(user_id)
            .bind(tier)
            .bind(credits_remaining)
            .bind(quota_limit)
            .bind(period_resets_at)
            .fetch_one(pool)
            .await
    }

    /// Find a ledger row by user.
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<UsageAccount>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM usage_accounts WHERE user_id = $1");
        sqlx::query_as::<_, UsageAccount>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Read-only eligibility check; never mutates the ledger row.
    ///
    /// For subscribers the result is period-roll aware: a due period reads
    /// as zero units used even though the row itself is only rolled by the
    /// next consume.
    pub async fn eligibility(pool: &PgPool, user_id: DbId) -> Result<Eligibility, UsageError> {
        let account = Self::find_by_user(pool, user_id)
            .await?
            .ok_or(UsageError::UnknownAccount(user_id))?;

        if account.tier == TIER_FREE {
            if account.credits_remaining > 0 {
                return Ok(Eligibility::Allowed);
            }
            return Ok(Eligibility::NoCredits);
        }

        let now = chrono::Utc::now();
        let (used, resets_at) = match account.period_resets_at {
            Some(anchor) if quota::period_is_due(anchor, now) => {
                (0, Some(quota::next_period_reset(anchor, now)))
            }
            other => (account.videos_used_this_period, other),
        };

        if used < account.quota_limit {
            Ok(Eligibility::Allowed)
        } else {
            Ok(Eligibility::QuotaExceeded(QuotaStatus {
                can_generate: false,
                used,
                limit: account.quota_limit,
                resets_at,
            }))
        }
    }

    /// Consume one usage unit for a user.
    ///
    /// Free tier: atomic decrement guarded by `credits_remaining > 0`.
    /// Subscriber: a due quota period is rolled first (its own conditional
    /// update, optimistic on the stored anchor), then an atomic increment
    /// guarded by `videos_used_this_period < quota_limit`.
    ///
    /// Fails with [`UsageError::InsufficientUnits`] when the guard fails at
    /// commit time -- the caller must then unwind its dispatch (best-effort
    /// provider cancel).
    pub async fn consume_one(pool: &PgPool, user_id: DbId) -> Result<(), UsageError> {
        let account = Self::find_by_user(pool, user_id)
            .await?
            .ok_or(UsageError::UnknownAccount(user_id))?;

        if account.tier == TIER_FREE {
            let result = sqlx::query(
                "UPDATE usage_accounts \
                 SET credits_remaining = credits_remaining - 1, updated_at = NOW() \
                 WHERE user_id = $1 AND tier = $2 AND credits_remaining > 0",
            )
            .bind(user_id)
            .bind(TIER_FREE)
            .execute(pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(UsageError::InsufficientUnits);
            }
            return Ok(());
        }

        Self::roll_period_if_due(pool, &account).await?;

        let result = sqlx::query(
            "UPDATE usage_accounts \
             SET videos_used_this_period = videos_used_this_period + 1, updated_at = NOW() \
             WHERE user_id = $1 AND tier = $2 \
               AND videos_used_this_period < quota_limit",
        )
        .bind(user_id)
        .bind(TIER_SUBSCRIBER)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UsageError::InsufficientUnits);
        }
        Ok(())
    }

    /// Refund one usage unit.
    ///
    /// Free tier only: subscriber quota is not scarcity-metered the same
    /// way, so nothing is returned against it. Per-job once-ness is the
    /// finalizer's responsibility (via the job's `refunded` flag), not the
    /// ledger's. Returns `true` if a credit was restored.
    pub async fn refund_one(pool: &PgPool, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE usage_accounts \
             SET credits_remaining = credits_remaining + 1, updated_at = NOW() \
             WHERE user_id = $1 AND tier = $2",
        )
        .bind(user_id)
        .bind(TIER_FREE)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Roll a subscriber's quota period forward when the anchor has lapsed.
    ///
    /// Optimistic conditional update on the stored anchor value: a
    /// concurrent roller losing the race simply affects zero rows.
    async fn roll_period_if_due(pool: &PgPool, account: &UsageAccount) -> Result<(), sqlx::Error> {
        let Some(anchor) = account.period_resets_at else {
            return Ok(());
        };

        let now = chrono::Utc::now();
        if !quota::period_is_due(anchor, now) {
            return Ok(());
        }

        let next = quota::next_period_reset(anchor, now);
        let result = sqlx::query(
            "UPDATE usage_accounts \
             SET videos_used_this_period = 0, period_resets_at = $3, updated_at = NOW() \
             WHERE user_id = $1 AND period_resets_at = $2",
        )
        .bind(account.user_id)
        .bind(anchor)
        .bind(next)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(
                user_id = account.user_id,
                %next,
                "Rolled subscriber quota period",
            );
        }
        Ok(())
    }
}
