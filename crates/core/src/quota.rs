//! Usage-tier constants, eligibility decisions, and quota-period arithmetic.
//!
//! Free-tier users spend one-shot credits; subscribers draw against a
//! monthly quota that resets on a per-account anchor instant. The atomic
//! ledger updates themselves live in the repository layer; this module
//! holds the pure decision logic.

use chrono::Months;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Free tier identifier (credit-metered).
pub const TIER_FREE: &str = "free";

/// Subscriber tier identifier (monthly-quota-metered).
pub const TIER_SUBSCRIBER: &str = "subscriber";

/// Valid tier values.
const VALID_TIERS: &[&str] = &[TIER_FREE, TIER_SUBSCRIBER];

/// Validate that `tier` is either `"free"` or `"subscriber"`.
pub fn validate_tier(tier: &str) -> Result<(), CoreError> {
    if VALID_TIERS.contains(&tier) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid tier '{tier}'. Must be one of: {VALID_TIERS:?}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Quota snapshot for a subscriber account.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub can_generate: bool,
    pub used: i32,
    pub limit: i32,
    pub resets_at: Option<Timestamp>,
}

/// Outcome of the read-only eligibility check.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Eligibility {
    /// The user may start a generation.
    Allowed,
    /// Free-tier user with zero credits remaining.
    NoCredits,
    /// Subscriber whose monthly quota is exhausted.
    QuotaExceeded(QuotaStatus),
}

impl Eligibility {
    /// Whether a generation request should be admitted.
    pub fn allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }
}

// ---------------------------------------------------------------------------
// Period arithmetic
// ---------------------------------------------------------------------------

/// Whether a subscriber's quota period has elapsed and must be rolled.
pub fn period_is_due(resets_at: Timestamp, now: Timestamp) -> bool {
    now >= resets_at
}

/// Advance a period anchor past `now`, one calendar month at a time.
///
/// Stepping from the stored anchor (instead of `now + 1 month`) keeps the
/// reset day stable for accounts that were dormant across several periods.
pub fn next_period_reset(mut resets_at: Timestamp, now: Timestamp) -> Timestamp {
    while resets_at <= now {
        resets_at = resets_at
            .checked_add_months(Months::new(1))
            .unwrap_or(resets_at + chrono::Duration::days(30));
    }
    resets_at
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
