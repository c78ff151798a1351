use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use lucid_core::error::CoreError;
use lucid_core::quota::QuotaStatus;
use lucid_db::repositories::UsageError;
use lucid_render::{DispatchError, StatusError};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `lucid_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Free-tier caller with no credits remaining (or a lost usage race).
    #[error("No generation credits remaining")]
    NoCredits,

    /// Subscriber quota exhausted; carries the quota snapshot for the client.
    #[error("Monthly video quota exhausted")]
    QuotaExceeded(QuotaStatus),

    /// The render provider rejected or never received the submission.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The render provider could not be queried.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::DispatchFailed(reason) => AppError::GenerationFailed(reason),
            // The narrow post-dispatch race surfaces to the client exactly
            // like an up-front credit shortage.
            DispatchError::UnitsExhausted => AppError::NoCredits,
            DispatchError::UnknownAccount(id) => {
                AppError::InternalError(format!("No usage account for user {id}"))
            }
            DispatchError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<UsageError> for AppError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::InsufficientUnits => AppError::NoCredits,
            UsageError::UnknownAccount(id) => AppError::Core(CoreError::NotFound {
                entity: "UsageAccount",
                id,
            }),
            UsageError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<StatusError> for AppError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::NotFound(id) => {
                AppError::BadRequest(format!("Unknown render job: {id}"))
            }
            StatusError::Provider(e) => AppError::ProviderUnavailable(e.to_string()),
            StatusError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                    None,
                ),
                CoreError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                    None,
                ),
                CoreError::Conflict(msg) => {
                    (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None)
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None)
                }
                CoreError::Forbidden(msg) => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone(), None)
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                        None,
                    )
                }
            },

            // --- Database errors ---
            AppError::Database(err) => {
                let (status, code, message) = classify_sqlx_error(err);
                (status, code, message, None)
            }

            // --- Usage gating ---
            AppError::NoCredits => (
                StatusCode::PAYMENT_REQUIRED,
                "NO_CREDITS",
                "No generation credits remaining".to_string(),
                None,
            ),
            AppError::QuotaExceeded(quota) => (
                StatusCode::TOO_MANY_REQUESTS,
                "QUOTA_EXCEEDED",
                "Monthly video quota exhausted".to_string(),
                Some(json!({
                    "used": quota.used,
                    "limit": quota.limit,
                    "resets_at": quota.resets_at,
                })),
            ),

            // --- Upstream provider ---
            AppError::GenerationFailed(reason) => (
                StatusCode::BAD_GATEWAY,
                "GENERATION_FAILED",
                reason.clone(),
                None,
            ),
            AppError::ProviderUnavailable(reason) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_UNAVAILABLE",
                reason.clone(),
                None,
            ),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
