//! Render job entity models and DTOs.
//!
//! A `render_jobs` row is created by the dispatcher and mutated only by
//! the finalizer; rows are never deleted (they are the audit trail of
//! every generation ever attempted).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use lucid_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `render_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RenderJob {
    pub id: DbId,
    /// Provider job id; `None` for jobs whose dispatch call never succeeded.
    pub correlation_id: Option<String>,
    pub owner_id: DbId,
    /// The dream/recording this video belongs to.
    pub dream_id: DbId,
    pub status_id: StatusId,
    pub artifact_path: Option<String>,
    pub provider_url: Option<String>,
    pub error_message: Option<String>,
    pub unit_consumed: bool,
    pub refunded: bool,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// Maximum accepted prompt length in characters.
pub const MAX_PROMPT_CHARS: u64 = 2000;

/// Body for `POST /api/v1/videos`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateVideoRequest {
    pub dream_id: DbId,
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
}

/// Response for `POST /api/v1/videos` (202 Accepted).
#[derive(Debug, Clone, Serialize)]
pub struct GenerateVideoResponse {
    pub job_id: DbId,
    /// Correlation id to poll `GET /api/v1/videos/{id}/status` with.
    pub provider_job_id: String,
}

/// Response for `GET /api/v1/videos/{id}/status`.
#[derive(Debug, Clone, Serialize)]
pub struct VideoStatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Query parameters for `GET /api/v1/videos`.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
