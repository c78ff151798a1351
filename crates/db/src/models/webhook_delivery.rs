//! Webhook idempotency ledger entity model.

use sqlx::FromRow;

use lucid_core::types::Timestamp;

/// A row from the `webhook_deliveries` table.
///
/// One row per unique external notification; created once, never mutated
/// or deleted.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookDelivery {
    pub notification_key: String,
    pub received_at: Timestamp,
}
