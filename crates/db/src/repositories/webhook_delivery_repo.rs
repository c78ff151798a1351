//! Repository for the `webhook_deliveries` idempotency ledger.

use sqlx::PgPool;

/// Provides the atomic check-and-insert over notification keys.
pub struct WebhookDeliveryRepo;

impl WebhookDeliveryRepo {
    /// Atomically record a notification key.
    ///
    /// Returns `true` if this is the first time the key was seen, `false`
    /// for a duplicate delivery. Relies on the primary-key constraint
    /// (`ON CONFLICT DO NOTHING` + rows-affected) so two near-simultaneous
    /// duplicate deliveries cannot both observe "first time".
    pub async fn record(pool: &PgPool, notification_key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO webhook_deliveries (notification_key) \
             VALUES ($1) \
             ON CONFLICT (notification_key) DO NOTHING",
        )
        .bind(notification_key)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether a notification key has been recorded.
    pub async fn exists(pool: &PgPool, notification_key: &str) -> Result<bool, sqlx::Error> {
        let found: Option<(String,)> = sqlx::query_as(
            "SELECT notification_key FROM webhook_deliveries WHERE notification_key = $1",
        )
        .bind(notification_key)
        .fetch_optional(pool)
        .await?;
        Ok(found.is_some())
    }
}
