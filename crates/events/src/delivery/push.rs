//! Push delivery of render outcomes to the notification collaborator.
//!
//! [`PushDelivery`] sends a JSON-encoded [`OutcomeNotice`] to the
//! collaborator's endpoint via HTTP POST. Failed attempts are retried up
//! to three times with exponential backoff (1 s, 2 s, 4 s). Delivery is
//! fire-and-forget from the orchestrator's point of view: the collaborator
//! owns user-visible alerting and dedups by `job_id`.

use std::time::Duration;

use serde::Serialize;

use lucid_core::types::DbId;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Notice payload
// ---------------------------------------------------------------------------

/// The event payload pushed to the notification collaborator.
///
/// Keyed by `job_id` so the collaborator can de-duplicate on its side.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeNotice {
    pub job_id: DbId,
    pub dream_id: DbId,
    /// `"completed"` or `"failed"`.
    pub outcome: String,
    /// Display name of the job owner, for alert rendering.
    pub owner_display_hint: String,
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for push delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The collaborator returned a non-2xx status code.
    #[error("Notification endpoint returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// PushDelivery
// ---------------------------------------------------------------------------

/// Delivers outcome notices to the external notification collaborator.
pub struct PushDelivery {
    client: reqwest::Client,
}

impl PushDelivery {
    /// Create a new delivery service with a pre-configured HTTP client.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }

    /// Deliver a notice to the collaborator URL with retry.
    ///
    /// Retries up to 3 times with exponential backoff before giving up.
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(&self, url: &str, notice: &OutcomeNotice) -> Result<(), PushError> {
        let mut last_err: Option<PushError> = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(url, notice).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        job_id = notice.job_id,
                        url,
                        error = %e,
                        "Notification delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(url, notice).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(
                    job_id = notice.job_id,
                    url,
                    error = %e,
                    "Notification delivery failed after all retries"
                );
                Err(last_err.unwrap_or(e))
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, url: &str, notice: &OutcomeNotice) -> Result<(), PushError> {
        let response = self.client.post(url).json(notice).send().await?;
        if !response.status().is_success() {
            return Err(PushError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for PushDelivery {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
