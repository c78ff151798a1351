//! Route definitions for provider-facing webhooks.
//!
//! Authenticated by payload signature, not by JWT.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /render     -> receive_render_webhook
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/render", post(webhooks::receive_render_webhook))
}
