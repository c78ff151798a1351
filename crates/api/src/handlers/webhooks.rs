//! Provider webhook receiver (push reconciliation path).
//!
//! Order of operations is load-bearing:
//!
//! 1. Verify the signature and timestamp freshness. Unverifiable requests
//!    are rejected with 401 and must not touch the idempotency ledger or
//!    the job store.
//! 2. Atomically check-and-insert the notification key; duplicates are
//!    answered success-as-duplicate and stop here.
//! 3. Map the provider status; terminal reports go through the shared
//!    finalizer, non-terminal reports are acknowledged with no state
//!    change.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use lucid_core::error::CoreError;
use lucid_core::signing;
use lucid_db::repositories::WebhookDeliveryRepo;
use lucid_render::{FinalizeOutcome, ProviderJobStatus, TerminalOutcome};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 signature.
const SIGNATURE_HEADER: &str = "x-lucid-signature";

/// Header carrying the provider's unique delivery id.
const DELIVERY_HEADER: &str = "x-lucid-delivery";

/// Header carrying the Unix timestamp the signature was computed at.
const TIMESTAMP_HEADER: &str = "x-lucid-timestamp";

/// Webhook body sent by the render provider.
#[derive(Debug, Deserialize)]
struct RenderWebhookPayload {
    correlation_id: String,
    status: String,
    #[serde(default)]
    output: Option<WebhookOutput>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookOutput {
    url: String,
}

/// POST /api/v1/webhooks/render
///
/// Authenticated by signature, not by JWT: the caller is the provider.
pub async fn receive_render_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    // -- 1. Authenticity ---------------------------------------------------
    let signature = require_header(&headers, SIGNATURE_HEADER)?;
    let timestamp = require_header(&headers, TIMESTAMP_HEADER)?;
    // Some provider configurations omit the delivery id; the signature
    // then covers an empty segment and deduplication falls back to
    // correlation id + status below.
    let delivery_id = header_value(&headers, DELIVERY_HEADER).unwrap_or_default();

    signing::verify_signature(
        &state.config.webhook_signing_secret,
        &delivery_id,
        &timestamp,
        &body,
        &signature,
        chrono::Utc::now().timestamp(),
        state.config.webhook_freshness_window_secs,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected unverifiable webhook delivery");
        AppError::Core(CoreError::Unauthorized("Webhook verification failed".into()))
    })?;

    let payload: RenderWebhookPayload = serde_json::from_str(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {e}")))?;

    // -- 2. Idempotency ----------------------------------------------------
    let notification_key = if delivery_id.is_empty() {
        format!("{}:{}", payload.correlation_id, payload.status)
    } else {
        delivery_id.clone()
    };

    let first_delivery = WebhookDeliveryRepo::record(&state.pool, &notification_key).await?;
    if !first_delivery {
        tracing::info!(
            notification_key = %notification_key,
            correlation_id = %payload.correlation_id,
            "Duplicate webhook delivery, no-op",
        );
        return Ok(Json(DataResponse {
            data: json!({ "result": "duplicate" }),
        }));
    }

    // -- 3. Reconcile ------------------------------------------------------
    let status = ProviderJobStatus::from_report(
        &payload.status,
        payload.output.map(|o| o.url),
        payload.error,
    );

    let outcome = match status {
        ProviderJobStatus::Queued | ProviderJobStatus::Processing => {
            // Still running: acknowledged, no state change.
            return Ok(Json(DataResponse {
                data: json!({ "result": "acknowledged" }),
            }));
        }
        ProviderJobStatus::Succeeded { output_url } => TerminalOutcome::Succeeded { output_url },
        ProviderJobStatus::Failed { error } => TerminalOutcome::Failed { error },
    };

    let result = match state
        .render
        .finalize(&payload.correlation_id, outcome)
        .await?
    {
        FinalizeOutcome::Applied(_) => "finalized",
        FinalizeOutcome::AlreadyFinal => "already_final",
        FinalizeOutcome::NotFound => "unknown_job",
    };

    Ok(Json(DataResponse {
        data: json!({ "result": result }),
    }))
}

/// Read a header as a string, if present.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Read a header, rejecting the request as unverifiable when absent.
fn require_header(headers: &HeaderMap, name: &str) -> AppResult<String> {
    header_value(headers, name).ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(format!(
            "Missing required webhook header: {name}"
        )))
    })
}
