//! Durable capture of every published event.
//!
//! [`EventPersistence::run`] consumes a bus subscription and writes each
//! event to the `events` table. Runs as a spawned background task; returns
//! when the bus sender is dropped (graceful shutdown).

use sqlx::PgPool;
use tokio::sync::broadcast;

use lucid_db::repositories::EventRepo;

use crate::bus::PlatformEvent;

/// Background writer from the event bus to the `events` table.
pub struct EventPersistence;

impl EventPersistence {
    /// Consume events until the channel closes.
    ///
    /// A lagged receiver (bus buffer overflow) logs the number of dropped
    /// events and keeps going — losing an audit row is preferable to
    /// wedging the bus.
    pub async fn run(pool: PgPool, mut rx: broadcast::Receiver<PlatformEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = EventRepo::insert(
                        &pool,
                        &event.event_type,
                        event.source_entity_type.as_deref(),
                        event.source_entity_id,
                        event.actor_user_id,
                        &event.payload,
                    )
                    .await
                    {
                        tracing::error!(
                            event_type = %event.event_type,
                            error = %e,
                            "Failed to persist event",
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event persistence lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence task exiting");
                    break;
                }
            }
        }
    }
}
