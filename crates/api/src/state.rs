use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: lucid_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Render orchestration service (dispatch, finalize, status check).
    pub render: Arc<lucid_render::RenderService>,
    /// Centralized event bus for publishing platform events.
    pub event_bus: Arc<lucid_events::EventBus>,
}
