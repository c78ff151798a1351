//! Shared helpers for API integration tests.
//!
//! Builds the application router through the production
//! [`build_app_router`] so tests exercise the same middleware stack
//! (CORS, request ID, timeout, tracing, panic recovery) that production
//! uses, with the render provider and artifact store stubbed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use sqlx::PgPool;

use lucid_api::auth::jwt::{generate_access_token, JwtConfig};
use lucid_api::config::ServerConfig;
use lucid_api::router::build_app_router;
use lucid_api::state::AppState;
use lucid_core::types::DbId;
use lucid_db::repositories::{UsageRepo, UserRepo};
use lucid_events::EventBus;
use lucid_render::{
    ArtifactStore, BackendError, ProviderJobStatus, RenderBackend, RenderRequest, RenderService,
    StorageError, SubmitAccepted,
};

/// Signing secret shared by tests and the stubbed provider.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// JWT secret used by the test config.
const TEST_JWT_SECRET: &str = "jwt_test_secret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        provider_api_url: "http://provider.invalid".to_string(),
        provider_api_key: "key_test".to_string(),
        provider_callback_url: None,
        webhook_signing_secret: TEST_WEBHOOK_SECRET.to_string(),
        webhook_freshness_window_secs: 300,
        artifact_root: "./artifacts-test".to_string(),
        notification_url: None,
    }
}

/// Scriptable provider backend double.
pub struct StubBackend {
    pub submit_response: Mutex<Result<String, String>>,
    pub status_response: Mutex<ProviderJobStatus>,
}

impl StubBackend {
    pub fn accepting(correlation_id: &str) -> Arc<Self> {
        Arc::new(Self {
            submit_response: Mutex::new(Ok(correlation_id.to_string())),
            status_response: Mutex::new(ProviderJobStatus::Queued),
        })
    }

    pub fn set_status(&self, status: ProviderJobStatus) {
        *self.status_response.lock().unwrap() = status;
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

    async fn cancel(&self, _correlation_id: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn status(&self, _correlation_id: &str) -> Result<ProviderJobStatus, BackendError> {
        Ok(self.status_response.lock().unwrap().clone())
    }
}

/// Artifact store double fabricating deterministic paths.
pub struct StubStore;

#[async_trait]
impl ArtifactStore for StubStore {
    async fn persist(&self, job_id: DbId, _source_url: &str) -> Result<String, StorageError> {
        Ok(format!("videos/{job_id}.mp4"))
    }
}

/// Build the application with stubbed provider and storage.
pub fn build_test_app(pool: PgPool, backend: Arc<StubBackend>) -> (Router, Arc<EventBus>) {
    let config = test_config();
    let bus = Arc::new(EventBus::default());
    let render = Arc::new(RenderService::new(
        pool.clone(),
        backend,
        Arc::new(StubStore),
        Arc::clone(&bus),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        render,
        event_bus: Arc::clone(&bus),
    };

    (build_app_router(state, &config), bus)
}

/// Mint a bearer token for a test user.
pub fn bearer(user_id: DbId, role: &str) -> String {
    let token = generate_access_token(
        user_id,
        role,
        &JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    )
    .unwrap();
    format!("Bearer {token}")
}

/// Create a free-tier user with the given credit balance.
pub async fn free_user(pool: &PgPool, credits: i32) -> DbId {
    let user = UserRepo::create(pool, "Dreamer").await.unwrap();
    UsageRepo::create(pool, user.id, lucid_core::quota::TIER_FREE, credits, 0, None)
        .await
        .unwrap();
    user.id
}

/// Create a subscriber with the given usage and quota.
pub async fn subscriber(pool: &PgPool, used: i32, quota_limit: i32) -> DbId {
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
    sqlx::query("UPDATE usage_accounts SET videos_used_this_period = $2 WHERE user_id = $1")
        .bind(user.id)
        .bind(used)
        .execute(pool)
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
