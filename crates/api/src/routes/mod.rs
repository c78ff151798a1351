//! Route tree assembly.

pub mod health;
pub mod videos;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/videos", videos::router())
        .nest("/webhooks", webhooks::router())
}
