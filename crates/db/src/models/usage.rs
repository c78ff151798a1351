//! Usage ledger entity model.

use serde::Serialize;
use sqlx::FromRow;

use lucid_core::types::{DbId, Timestamp};

/// A row from the `usage_accounts` table (one per user).
///
/// Free-tier accounts meter `credits_remaining`; subscriber accounts meter
/// `videos_used_this_period` against `quota_limit` with a per-account
/// `period_resets_at` anchor.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsageAccount {
    pub user_id: DbId,
    pub tier: String,
    pub credits_remaining: i32,
    pub videos_used_this_period: i32,
    pub quota_limit: i32,
    pub period_resets_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}
