//! Route definitions for the `/videos` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::videos;
use crate::state::AppState;

/// Routes mounted at `/videos`.
///
/// ```text
/// GET    /                 -> list_videos
/// POST   /                 -> generate_video
/// GET    /eligibility      -> eligibility
/// GET    /{id}/status      -> video_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(videos::list_videos).post(videos::generate_video))
        .route("/eligibility", get(videos::eligibility))
        .route("/{id}/status", get(videos::video_status))
}
