//! Webhook receiver integration tests: signature verification, replay
//! protection, idempotent delivery handling, and finalization.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::util::ServiceExt;

use common::{build_test_app, credits_remaining, free_user, StubBackend, TEST_WEBHOOK_SECRET};
use lucid_core::signing::compute_signature;
use lucid_db::models::status::RenderJobStatus;
use lucid_db::repositories::{RenderJobRepo, WebhookDeliveryRepo};

/// Build a signed webhook request.
fn signed_request(delivery_id: &str, timestamp: i64, body: &str) -> Request<Body> {
    let signature = compute_signature(TEST_WEBHOOK_SECRET, delivery_id, timestamp, body);
    Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/render")
        .header("content-type", "application/json")
        .header("x-lucid-signature", signature)
        .header("x-lucid-delivery", delivery_id)
        .header("x-lucid-timestamp", timestamp.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn failure_body(correlation_id: &str) -> String {
    serde_json::json!({
        "correlation_id": correlation_id,
        "status": "failed",
        "error": "render node lost",
    })
    .to_string()
}

fn success_body(correlation_id: &str) -> String {
    serde_json::json!({
        "correlation_id": correlation_id,
        "status": "succeeded",
        "output": { "url": format!("https://provider.example/out/{correlation_id}.mp4") },
    })
    .to_string()
}

async fn response_result(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    json["data"]["result"].as_str().unwrap_or_default().to_string()
}

/// Seed a Pending job for a fresh free-tier user; returns the owner id.
async fn pending_job(pool: &PgPool, correlation_id: &str) -> i64 {
    let user_id = free_user(pool, 1).await;
    lucid_db::repositories::UsageRepo::consume_one(pool, user_id)
        .await
        .unwrap();
    RenderJobRepo::insert_pending(pool, user_id, 7, correlation_id, true)
        .await
        .unwrap();
    user_id
}

// ---------------------------------------------------------------------------
// Verification boundary
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn unsigned_webhook_is_rejected_without_side_effects(pool: PgPool) {
    pending_job(&pool, "rnd_1").await;
    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_1"));

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/render")
        .header("content-type", "application/json")
        .body(Body::from(failure_body("rnd_1")))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Neither the idempotency ledger nor the job store was touched.
    let deliveries: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM webhook_deliveries")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(deliveries.0, 0);

    let job = RenderJobRepo::find_by_correlation(&pool, "rnd_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status_id, RenderJobStatus::Pending.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn tampered_signature_is_rejected(pool: PgPool) {
    pending_job(&pool, "rnd_1").await;
    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_1"));

    let now = chrono::Utc::now().timestamp();
    let mut request = signed_request("dlv_1", now, &failure_body("rnd_1"));
    request.headers_mut().insert(
        "x-lucid-signature",
        "0".repeat(64).parse().unwrap(),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stale_timestamp_is_rejected(pool: PgPool) {
    pending_job(&pool, "rnd_1").await;
    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_1"));

    // Correctly signed, but an hour old: replay-window violation.
    let stale = chrono::Utc::now().timestamp() - 3600;
    let response = app
        .oneshot(signed_request("dlv_1", stale, &failure_body("rnd_1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let deliveries: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM webhook_deliveries")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(deliveries.0, 0);
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn failure_webhook_finalizes_and_refunds(pool: PgPool) {
    let owner_id = pending_job(&pool, "rnd_1").await;
    assert_eq!(credits_remaining(&pool, owner_id).await, 0);

    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_1"));

    let now = chrono::Utc::now().timestamp();
    let response = app
        .oneshot(signed_request("dlv_1", now, &failure_body("rnd_1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_result(response).await, "finalized");

    let job = RenderJobRepo::find_by_correlation(&pool, "rnd_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status_id, RenderJobStatus::Failed.id());
    assert_eq!(job.error_message.as_deref(), Some("render node lost"));
    assert!(job.refunded);

    // Free-tier failure restores the credit.
    assert_eq!(credits_remaining(&pool, owner_id).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn success_webhook_completes_and_keeps_credit_spent(pool: PgPool) {
    let owner_id = pending_job(&pool, "rnd_1").await;
    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_1"));

    let now = chrono::Utc::now().timestamp();
    let response = app
        .oneshot(signed_request("dlv_1", now, &success_body("rnd_1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_result(response).await, "finalized");

    let job = RenderJobRepo::find_by_correlation(&pool, "rnd_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status_id, RenderJobStatus::Completed.id());
    assert!(job.artifact_path.is_some());
    assert_eq!(credits_remaining(&pool, owner_id).await, 0, "success is never refunded");
}

/// The same delivery id replayed: success-as-duplicate, nothing re-applied.
#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_delivery_is_a_noop(pool: PgPool) {
    let owner_id = pending_job(&pool, "rnd_1").await;
    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_1"));

    let now = chrono::Utc::now().timestamp();
    let body = failure_body("rnd_1");

    let first = app
        .clone()
        .oneshot(signed_request("dlv_1", now, &body))
        .await
        .unwrap();
    assert_eq!(response_result(first).await, "finalized");

    let second = app
        .oneshot(signed_request("dlv_1", now, &body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(response_result(second).await, "duplicate");

    // One refund despite two deliveries.
    assert_eq!(credits_remaining(&pool, owner_id).await, 1);
}

/// A re-report through a *different* delivery id passes the idempotency
/// ledger but stops at the terminal-status guard.
#[sqlx::test(migrations = "../../db/migrations")]
async fn re_report_with_new_delivery_id_hits_the_status_guard(pool: PgPool) {
    let owner_id = pending_job(&pool, "rnd_1").await;
    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_1"));

    let now = chrono::Utc::now().timestamp();
    let body = failure_body("rnd_1");

    let first = app
        .clone()
        .oneshot(signed_request("dlv_1", now, &body))
        .await
        .unwrap();
    assert_eq!(response_result(first).await, "finalized");

    let second = app
        .oneshot(signed_request("dlv_2", now, &body))
        .await
        .unwrap();
    assert_eq!(response_result(second).await, "already_final");

    assert_eq!(credits_remaining(&pool, owner_id).await, 1, "still exactly one refund");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn non_terminal_status_is_acknowledged_without_state_change(pool: PgPool) {
    pending_job(&pool, "rnd_1").await;
    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_1"));

    let body = serde_json::json!({
        "correlation_id": "rnd_1",
        "status": "processing",
    })
    .to_string();

    let now = chrono::Utc::now().timestamp();
    let response = app
        .oneshot(signed_request("dlv_1", now, &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_result(response).await, "acknowledged");

    let job = RenderJobRepo::find_by_correlation(&pool, "rnd_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        job.status_id,
        RenderJobStatus::Pending.id(),
        "webhook path causes no non-terminal state change"
    );
    // The notification was still recorded for dedup.
    assert!(WebhookDeliveryRepo::exists(&pool, "dlv_1").await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_correlation_id_is_acknowledged_as_nonfatal(pool: PgPool) {
    let (app, _bus) = build_test_app(pool.clone(), StubBackend::accepting("rnd_x"));

    let now = chrono::Utc::now().timestamp();
    let response = app
        .oneshot(signed_request("dlv_1", now, &failure_body("rnd_foreign")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_result(response).await, "unknown_job");
}
