//! The render service handle.
//!
//! One `RenderService` is constructed at process start and passed by
//! handle to request handlers -- no global mutable state. It owns the
//! provider backend, the artifact store, and the event bus, and is the
//! only component that dispatches or finalizes jobs.

use std::sync::Arc;

use async_trait::async_trait;

use lucid_core::types::DbId;
use lucid_db::models::render_job::RenderJob;
use lucid_db::models::status::RenderJobStatus;
use lucid_db::repositories::RenderJobRepo;
use lucid_db::DbPool;
use lucid_events::EventBus;

use crate::backend::{BackendError, ProviderJobStatus, RenderBackend, RenderRequest};
use crate::dispatcher::{self, DispatchError};
use crate::finalizer::{self, FinalizeOutcome, TerminalOutcome};
use crate::poller::{PolledStatus, ProbeFailure, StatusProbe};
use crate::storage::ArtifactStore;

/// Errors from the status-check operation.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// No job with this correlation id exists.
    #[error("Unknown render job: {0}")]
    NotFound(String),

    /// The provider status query failed (transport or provider error).
    #[error(transparent)]
    Provider(#[from] BackendError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Orchestrates render jobs end to end.
pub struct RenderService {
    pool: DbPool,
    backend: Arc<dyn RenderBackend>,
    store: Arc<dyn ArtifactStore>,
    bus: Arc<EventBus>,
}

impl RenderService {
    pub fn new(
        pool: DbPool,
        backend: Arc<dyn RenderBackend>,
        store: Arc<dyn ArtifactStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            backend,
            store,
            bus,
        }
    }

    /// Submit a generation request for a user. Dispatch sequence:
    /// provider first, usage unit second, job row last.
    pub async fn dispatch(
        &self,
        user_id: DbId,
        dream_id: DbId,
        request: &RenderRequest,
    ) -> Result<RenderJob, DispatchError> {
        dispatcher::dispatch(&self.pool, self.backend.as_ref(), user_id, dream_id, request).await
    }

    /// Apply a terminal outcome exactly once (idempotent; callable from
    /// both the webhook receiver and the poll path).
    pub async fn finalize(
        &self,
        correlation_id: &str,
        outcome: TerminalOutcome,
    ) -> Result<FinalizeOutcome, sqlx::Error> {
        finalizer::finalize(
            &self.pool,
            self.store.as_ref(),
            &self.bus,
            correlation_id,
            outcome,
        )
        .await
    }

    /// The status-check operation behind `GET /videos/{id}/status`.
    ///
    /// Terminal rows answer from the store without touching the provider.
    /// Otherwise the provider is queried; a terminal report is routed
    /// through the finalizer (the same code path the webhook uses) before
    /// the resolved row is returned, and a running report bumps
    /// Pending → Processing.
    pub async fn check_status(&self, correlation_id: &str) -> Result<RenderJob, StatusError> {
        let job = RenderJobRepo::find_by_correlation(&self.pool, correlation_id)
            .await?
            .ok_or_else(|| StatusError::NotFound(correlation_id.to_string()))?;

        if RenderJobStatus::from_id(job.status_id).is_some_and(|s| s.is_terminal()) {
            return Ok(job);
        }

        let outcome = match self.backend.status(correlation_id).await? {
            ProviderJobStatus::Queued => return Ok(job),
            ProviderJobStatus::Processing => {
                RenderJobRepo::mark_processing(&self.pool, correlation_id).await?;
                return self.reload(correlation_id).await;
            }
            ProviderJobStatus::Succeeded { output_url } => TerminalOutcome::Succeeded { output_url },
            ProviderJobStatus::Failed { error } => TerminalOutcome::Failed { error },
        };

        self.finalize(correlation_id, outcome).await?;
        self.reload(correlation_id).await
    }

    /// Fetch the authoritative row after a transition.
    async fn reload(&self, correlation_id: &str) -> Result<RenderJob, StatusError> {
        RenderJobRepo::find_by_correlation(&self.pool, correlation_id)
            .await?
            .ok_or_else(|| StatusError::NotFound(correlation_id.to_string()))
    }

    /// Build a [`StatusProbe`] for the poll loop over one job.
    pub fn probe(self: &Arc<Self>, correlation_id: impl Into<String>) -> JobStatusProbe {
        JobStatusProbe {
            service: Arc::clone(self),
            correlation_id: correlation_id.into(),
        }
    }
}

/// [`StatusProbe`] adapter over [`RenderService::check_status`], so the
/// client poll loop and the status endpoint resolve through the identical
/// code path.
pub struct JobStatusProbe {
    service: Arc<RenderService>,
    correlation_id: String,
}

#[async_trait]
impl StatusProbe for JobStatusProbe {
    async fn check(&mut self) -> Result<PolledStatus, ProbeFailure> {
        let job = self
            .service
            .check_status(&self.correlation_id)
            .await
            .map_err(|e| ProbeFailure(e.to_string()))?;

        Ok(match RenderJobStatus::from_id(job.status_id) {
            Some(RenderJobStatus::Completed) => PolledStatus::Completed,
            Some(RenderJobStatus::Failed) => PolledStatus::Failed,
            _ => PolledStatus::Running,
        })
    }
}
