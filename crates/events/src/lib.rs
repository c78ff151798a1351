//! Lucid event bus and notification infrastructure.
//!
//! Building blocks for the backend-wide event system:
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] — the canonical domain event envelope.
//! - [`EventPersistence`] — background service that durably writes every
//!   event to the `events` table (audit trail).
//! - [`delivery`] — fire-and-forget push of render outcomes to the
//!   external notification collaborator.
//! - [`Notifier`] — background service bridging the bus to that delivery.

pub mod bus;
pub mod delivery;
pub mod notifier;
pub mod persistence;

pub use bus::{EventBus, PlatformEvent, EVENT_VIDEO_COMPLETED, EVENT_VIDEO_FAILED};
pub use delivery::push::{OutcomeNotice, PushDelivery};
pub use notifier::Notifier;
pub use persistence::EventPersistence;
