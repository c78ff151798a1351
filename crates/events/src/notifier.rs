//! Bridge from the event bus to the notification collaborator.
//!
//! [`Notifier::run`] subscribes to the bus and forwards each
//! `video.completed` / `video.failed` event as an [`OutcomeNotice`].
//! Delivery failures are logged and dropped — the collaborator owns
//! user-visible alerting; the authoritative job row already carries the
//! outcome for any later status query.

use tokio::sync::broadcast;

use crate::bus::{PlatformEvent, EVENT_VIDEO_COMPLETED, EVENT_VIDEO_FAILED};
use crate::delivery::push::{OutcomeNotice, PushDelivery};

/// Background forwarder of render outcomes.
pub struct Notifier {
    delivery: PushDelivery,
    collaborator_url: String,
}

impl Notifier {
    pub fn new(collaborator_url: String) -> Self {
        Self {
            delivery: PushDelivery::new(),
            collaborator_url,
        }
    }

    /// Consume events until the channel closes.
    pub async fn run(self, mut rx: broadcast::Receiver<PlatformEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notifier lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notifier exiting");
                    break;
                }
            }
        }
    }

    async fn handle_event(&self, event: &PlatformEvent) {
        let outcome = match event.event_type.as_str() {
            EVENT_VIDEO_COMPLETED => "completed",
            EVENT_VIDEO_FAILED => "failed",
            _ => return,
        };

        let Some(notice) = build_notice(event, outcome) else {
            tracing::warn!(
                event_type = %event.event_type,
                "Render outcome event missing required fields, skipping notification",
            );
            return;
        };

        if let Err(e) = self.delivery.deliver(&self.collaborator_url, &notice).await {
            tracing::error!(
                job_id = notice.job_id,
                error = %e,
                "Giving up on outcome notification (fire-and-forget)",
            );
        }
    }
}

/// Assemble a notice from an outcome event's envelope and payload.
fn build_notice(event: &PlatformEvent, outcome: &str) -> Option<OutcomeNotice> {
    Some(OutcomeNotice {
        job_id: event.source_entity_id?,
        dream_id: event.payload.get("dream_id")?.as_i64()?,
        outcome: outcome.to_string(),
        owner_display_hint: event
            .payload
            .get("owner_display_hint")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}
