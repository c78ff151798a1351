//! Liveness endpoint, mounted at the root (not under `/api/v1`).

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /health
///
/// Returns 200 with a database round-trip, so orchestration platforms
/// catch a wedged pool and not just a live process.
async fn health(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    lucid_db::health_check(&state.pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}
