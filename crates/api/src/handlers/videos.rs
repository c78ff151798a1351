//! Handlers for the `/videos` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. The status
//! endpoint is the server side of the client poll loop: it resolves
//! through the same finalizer the webhook receiver uses.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use lucid_core::error::CoreError;
use lucid_core::roles::ROLE_ADMIN;
use lucid_db::models::render_job::{
    GenerateVideoRequest, GenerateVideoResponse, JobListQuery, RenderJob, VideoStatusResponse,
};
use lucid_db::models::status::RenderJobStatus;
use lucid_core::quota::Eligibility;
use lucid_db::repositories::{RenderJobRepo, UsageRepo};
use lucid_render::RenderRequest;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Shape a job row into the status-check response.
fn status_response(job: &RenderJob) -> VideoStatusResponse {
    let status = RenderJobStatus::from_id(job.status_id)
        .map(RenderJobStatus::name)
        .unwrap_or("pending");

    VideoStatusResponse {
        status,
        artifact_path: job.artifact_path.clone(),
        artifact_url: job.provider_url.clone(),
        error: job.error_message.clone(),
    }
}

/// Verify the caller may see this job (owner or admin).
fn authorize_view(job: &RenderJob, auth: &AuthUser) -> AppResult<()> {
    if job.owner_id != auth.user_id && auth.role != ROLE_ADMIN {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot view another user's render job".into(),
        )));
    }
    Ok(())
}

/// Map the usage-ledger gate onto the generation error surface.
fn gate_eligibility(eligibility: Eligibility) -> AppResult<()> {
    match eligibility {
        Eligibility::Allowed => Ok(()),
        Eligibility::NoCredits => Err(AppError::NoCredits),
        Eligibility::QuotaExceeded(quota) => Err(AppError::QuotaExceeded(quota)),
    }
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

/// POST /api/v1/videos
///
/// Submit a video generation for one of the caller's dreams. Gated by the
/// usage ledger; the unit itself is consumed only after the provider has
/// accepted the job. Returns 202 with the correlation id to poll.
pub async fn generate_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<GenerateVideoRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    gate_eligibility(UsageRepo::eligibility(&state.pool, auth.user_id).await?)?;

    let request = RenderRequest {
        prompt: input.prompt,
        callback_url: state.config.provider_callback_url.clone(),
    };

    let job = state
        .render
        .dispatch(auth.user_id, input.dream_id, &request)
        .await?;

    let provider_job_id = job
        .correlation_id
        .clone()
        .unwrap_or_default();

    tracing::info!(
        job_id = job.id,
        user_id = auth.user_id,
        dream_id = input.dream_id,
        correlation_id = %provider_job_id,
        "Video generation accepted",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: GenerateVideoResponse {
                job_id: job.id,
                provider_job_id,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status check (poll path)
// ---------------------------------------------------------------------------

/// GET /api/v1/videos/{provider_job_id}/status
///
/// The status-check operation the client polls. Queries the provider for
/// in-flight jobs and finalizes terminal reports through the shared
/// finalizer before answering, so the poll path and the webhook converge
/// on one code path.
pub async fn video_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(provider_job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    // Authorize against the stored row before any provider traffic, so a
    // non-owner cannot drive reconciliation for someone else's job.
    let stored = RenderJobRepo::find_by_correlation(&state.pool, &provider_job_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Unknown render job: {provider_job_id}")))?;
    authorize_view(&stored, &auth)?;

    let job = state.render.check_status(&provider_job_id).await?;

    Ok(Json(DataResponse {
        data: status_response(&job),
    }))
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// GET /api/v1/videos/eligibility
///
/// Read-only usage gate snapshot, for the client to disable the generate
/// button up front instead of discovering the shortage on submit.
pub async fn eligibility(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let eligibility = UsageRepo::eligibility(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: eligibility }))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/videos
///
/// The caller's generation history, most recent first. Job rows are never
/// deleted, so this is the full audit trail.
pub async fn list_videos(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = RenderJobRepo::list_by_owner(&state.pool, auth.user_id, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}
