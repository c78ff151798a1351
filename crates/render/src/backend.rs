//! HTTP client for the external render provider's REST API.
//!
//! Wraps the provider's job endpoints (submission, cancellation, status
//! retrieval) using [`reqwest`]. The [`RenderBackend`] trait is the seam
//! that lets orchestration code run against an in-memory stub in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Default timeout for a single provider API call.
///
/// A submission that exceeds this is treated as a dispatch failure by the
/// caller; no usage unit has been consumed at that point.
const API_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// A generation request handed to the provider.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// The constructed generation prompt (built upstream from the dream
    /// transcript; opaque to this crate).
    pub prompt: String,
    /// Webhook URL the provider should call back on completion, if the
    /// deployment has a public callback endpoint.
    pub callback_url: Option<String>,
}

/// Response returned by the provider after successfully queuing a job.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAccepted {
    /// Provider-assigned job identifier (the correlation id).
    #[serde(rename = "id")]
    pub correlation_id: String,
}

/// Provider-reported job state, already mapped to this system's terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderJobStatus {
    /// Accepted but not yet running.
    Queued,
    /// Actively rendering.
    Processing,
    /// Render finished; the output URL is possibly time-limited.
    Succeeded { output_url: String },
    /// Render failed or was cancelled upstream.
    Failed { error: String },
}

impl ProviderJobStatus {
    /// Whether this status permits no further provider-side transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProviderJobStatus::Succeeded { .. } | ProviderJobStatus::Failed { .. }
        )
    }

    /// Map a raw provider status report to [`ProviderJobStatus`].
    ///
    /// Shared by the REST status query and the webhook receiver so both
    /// reconciliation paths interpret provider reports identically.
    /// Cancelled and errored provider jobs both map to `Failed`. A
    /// `succeeded` report without an output URL is a provider contract
    /// violation and is treated as a failure rather than a completion we
    /// cannot persist.
    pub fn from_report(
        status: &str,
        output_url: Option<String>,
        error: Option<String>,
    ) -> ProviderJobStatus {
        match status {
            "succeeded" => match output_url {
                Some(output_url) => ProviderJobStatus::Succeeded { output_url },
                None => ProviderJobStatus::Failed {
                    error: "Provider reported success without an output URL".to_string(),
                },
            },
            "failed" | "error" | "canceled" | "cancelled" => ProviderJobStatus::Failed {
                error: error
                    .unwrap_or_else(|| "Provider reported failure without detail".to_string()),
            },
            "processing" | "running" => ProviderJobStatus::Processing,
            // "queued", "starting", and anything unrecognized: not terminal.
            _ => ProviderJobStatus::Queued,
        }
    }
}

/// Raw wire shape of a provider status response.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    output: Option<StatusOutput>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusOutput {
    url: String,
}

/// Map a raw wire status response to [`ProviderJobStatus`].
fn map_status(raw: StatusResponse) -> ProviderJobStatus {
    ProviderJobStatus::from_report(&raw.status, raw.output.map(|o| o.url), raw.error)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the provider REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

// ---------------------------------------------------------------------------
// RenderBackend trait
// ---------------------------------------------------------------------------

/// Operations the orchestrator needs from the render provider.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Submit a generation request. Returns the provider's correlation id.
    async fn submit(&self, request: &RenderRequest) -> Result<SubmitAccepted, BackendError>;

    /// Best-effort cancellation of a previously submitted job. The
    /// provider may not honor it.
    async fn cancel(&self, correlation_id: &str) -> Result<(), BackendError>;

    /// Query the current status of a job.
    async fn status(&self, correlation_id: &str) -> Result<ProviderJobStatus, BackendError>;
}

// ---------------------------------------------------------------------------
// HttpRenderBackend
// ---------------------------------------------------------------------------

/// Production [`RenderBackend`] speaking the provider's REST API.
pub struct HttpRenderBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpRenderBackend {
    /// Create a new backend client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://api.provider.example`.
    /// * `api_key` - Bearer token for the provider account.
    pub fn new(api_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            api_url,
            api_key,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`BackendError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), BackendError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RenderBackend for HttpRenderBackend {
    async fn submit(&self, request: &RenderRequest) -> Result<SubmitAccepted, BackendError> {
        let body = serde_json::json!({
            "prompt": request.prompt,
            "webhook_url": request.callback_url,
        });

        let response = self
            .client
            .post(format!("{}/v1/renders", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn cancel(&self, correlation_id: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(format!("{}/v1/renders/{}/cancel", self.api_url, correlation_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn status(&self, correlation_id: &str) -> Result<ProviderJobStatus, BackendError> {
        let response = self
            .client
            .get(format!("{}/v1/renders/{}", self.api_url, correlation_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let raw: StatusResponse = Self::parse_response(response).await?;
        Ok(map_status(raw))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
