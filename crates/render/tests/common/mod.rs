//! Shared test doubles for orchestration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::PgPool;

use lucid_core::types::DbId;
use lucid_db::repositories::{UsageRepo, UserRepo};
use lucid_events::EventBus;
use lucid_render::{
    ArtifactStore, BackendError, ProviderJobStatus, RenderBackend, RenderRequest, RenderService,
    StorageError, SubmitAccepted,
};

/// In-memory [`RenderBackend`] with scriptable responses.
pub struct StubBackend {
    /// Correlation id handed out on submit, or an error body.
    pub submit_response: Mutex<Result<String, String>>,
    /// Status returned for every status query.
    pub status_response: Mutex<ProviderJobStatus>,
    /// Correlation ids passed to `cancel`.
    pub cancel_calls: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn accepting(correlation_id: &str) -> Arc<Self> {
        Arc::new(Self {
            submit_response: Mutex::new(Ok(correlation_id.to_string())),
            status_response: Mutex::new(ProviderJobStatus::Queued),
            cancel_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting(body: &str) -> Arc<Self> {
        Arc::new(Self {
            submit_response: Mutex::new(Err(body.to_string())),
            status_response: Mutex::new(ProviderJobStatus::Queued),
            cancel_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_status(&self, status: ProviderJobStatus) {
        *self.status_response.lock().unwrap() = status;
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.cancel_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderBackend for StubBackend {
    async fn submit(&self, _request: &RenderRequest) -> Result<SubmitAccepted, BackendError> {
        match self.submit_response.lock().unwrap().clone() {
            Ok(correlation_id) => Ok(SubmitAccepted { correlation_id }),
            Err(body) => Err(BackendError::ApiError { status: 503, body }),
        }
    }

    async fn cancel(&self, correlation_id: &str) -> Result<(), BackendError> {
        self.cancel_calls
            .lock()
            .unwrap()
            .push(correlation_id.to_string());
        Ok(())
    }

    async fn status(&self, _correlation_id: &str) -> Result<ProviderJobStatus, BackendError> {
        Ok(self.status_response.lock().unwrap().clone())
    }
}

/// In-memory [`ArtifactStore`] that fabricates deterministic paths.
pub struct StubStore {
    pub fail_persist: bool,
    pub persist_calls: AtomicUsize,
}

impl StubStore {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            fail_persist: false,
            persist_calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_persist: true,
            persist_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ArtifactStore for StubStore {
    async fn persist(&self, job_id: DbId, _source_url: &str) -> Result<String, StorageError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist {
            return Err(StorageError::HttpStatus(404));
        }
        Ok(format!("videos/{job_id}.mp4"))
    }
}

/// Assemble a service over the given stubs.
pub fn service(
    pool: &PgPool,
    backend: Arc<StubBackend>,
    store: Arc<StubStore>,
    bus: Arc<EventBus>,
) -> Arc<RenderService> {
    Arc::new(RenderService::new(pool.clone(), backend, store, bus))
}

/// Create a free-tier user with the given credit balance.
pub async fn free_user(pool: &PgPool, credits: i32) -> DbId {
    let user = UserRepo::create(pool, "Dreamer").await.unwrap();
    UsageRepo::create(pool, user.id, lucid_core::quota::TIER_FREE, credits, 0, None)
        .await
        .unwrap();
    user.id
}

/// Create a subscriber with the given quota.
pub async fn subscriber(pool: &PgPool, quota_limit: i32) -> DbId {
    let user = UserRepo::create(pool, "Subscriber").await.unwrap();
    UsageRepo::create(
        pool,
        user.id,
        lucid_core::quota::TIER_SUBSCRIBER,
        0,
        quota_limit,
        Some(chrono::Utc::now() + chrono::Duration::days(10)),
    )
    .await
    .unwrap();
    user.id
}

/// Current free-tier balance.
pub async fn credits_remaining(pool: &PgPool, user_id: DbId) -> i32 {
    UsageRepo::find_by_user(pool, user_id)
        .await
        .unwrap()
        .unwrap()
        .credits_remaining
}
