//! Render-job lifecycle tests: monotonic transitions and the conditional
//! terminal update that closes the two-reconciliation-path race.

use sqlx::PgPool;

use lucid_core::types::DbId;
use lucid_db::models::render_job::JobListQuery;
use lucid_db::models::status::RenderJobStatus;
use lucid_db::repositories::{RenderJobRepo, UserRepo};

async fn owner(pool: &PgPool) -> DbId {
    UserRepo::create(pool, "Dreamer").await.unwrap().id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn pending_job_is_created_with_correlation_id(pool: PgPool) {
    let owner_id = owner(&pool).await;

    let job = RenderJobRepo::insert_pending(&pool, owner_id, 7, "rnd_abc", true)
        .await
        .unwrap();

    assert_eq!(job.status_id, RenderJobStatus::Pending.id());
    assert_eq!(job.correlation_id.as_deref(), Some("rnd_abc"));
    assert!(job.unit_consumed);
    assert!(!job.refunded);
    assert!(job.completed_at.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn dispatch_failure_audit_row_skips_pending(pool: PgPool) {
    let owner_id = owner(&pool).await;

    let job = RenderJobRepo::insert_failed(&pool, owner_id, 7, None, "provider unreachable")
        .await
        .unwrap();

    assert_eq!(job.status_id, RenderJobStatus::Failed.id());
    assert!(job.correlation_id.is_none());
    assert!(!job.unit_consumed);
    assert_eq!(job.error_message.as_deref(), Some("provider unreachable"));
    assert!(job.completed_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn mark_processing_only_moves_pending(pool: PgPool) {
    let owner_id = owner(&pool).await;
    RenderJobRepo::insert_pending(&pool, owner_id, 7, "rnd_abc", true)
        .await
        .unwrap();

    assert!(RenderJobRepo::mark_processing(&pool, "rnd_abc").await.unwrap());
    // Second bump is a no-op (already Processing).
    assert!(!RenderJobRepo::mark_processing(&pool, "rnd_abc").await.unwrap());

    RenderJobRepo::complete(&pool, "rnd_abc", "videos/1.mp4", None)
        .await
        .unwrap()
        .expect("transition should win");

    // A terminal job can never regress to Processing.
    assert!(!RenderJobRepo::mark_processing(&pool, "rnd_abc").await.unwrap());
    let job = RenderJobRepo::find_by_correlation(&pool, "rnd_abc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status_id, RenderJobStatus::Completed.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn complete_sets_artifact_fields(pool: PgPool) {
    let owner_id = owner(&pool).await;
    RenderJobRepo::insert_pending(&pool, owner_id, 7, "rnd_abc", true)
        .await
        .unwrap();

    let job = RenderJobRepo::complete(
        &pool,
        "rnd_abc",
        "videos/1.mp4",
        Some("https://provider.example/out/1.mp4"),
    )
    .await
    .unwrap()
    .expect("first terminal transition wins");

    assert_eq!(job.status_id, RenderJobStatus::Completed.id());
    assert_eq!(job.artifact_path.as_deref(), Some("videos/1.mp4"));
    assert!(job.provider_url.is_some());
    assert!(job.error_message.is_none());
    assert!(job.completed_at.is_some());
}

/// The conditional update makes the second terminal transition a no-op,
/// whichever outcome it reports.
#[sqlx::test(migrations = "../../db/migrations")]
async fn terminal_jobs_cannot_be_finalized_again(pool: PgPool) {
    let owner_id = owner(&pool).await;
    RenderJobRepo::insert_pending(&pool, owner_id, 7, "rnd_abc", true)
        .await
        .unwrap();

    RenderJobRepo::complete(&pool, "rnd_abc", "videos/1.mp4", None)
        .await
        .unwrap()
        .expect("first transition wins");

    let second_complete = RenderJobRepo::complete(&pool, "rnd_abc", "videos/other.mp4", None)
        .await
        .unwrap();
    assert!(second_complete.is_none(), "duplicate complete must no-op");

    let late_fail = RenderJobRepo::fail(&pool, "rnd_abc", "late failure report", true)
        .await
        .unwrap();
    assert!(late_fail.is_none(), "failure after completion must no-op");

    let job = RenderJobRepo::find_by_correlation(&pool, "rnd_abc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status_id, RenderJobStatus::Completed.id());
    assert_eq!(job.artifact_path.as_deref(), Some("videos/1.mp4"));
}

/// Two racing terminal transitions: exactly one row update wins.
#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_terminal_transitions_have_one_winner(pool: PgPool) {
    let owner_id = owner(&pool).await;
    RenderJobRepo::insert_pending(&pool, owner_id, 7, "rnd_abc", true)
        .await
        .unwrap();

    let (complete, fail) = tokio::join!(
        RenderJobRepo::complete(&pool, "rnd_abc", "videos/1.mp4", None),
        RenderJobRepo::fail(&pool, "rnd_abc", "provider error", true),
    );

    let winners = [complete.unwrap().is_some(), fail.unwrap().is_some()]
        .iter()
        .filter(|w| **w)
        .count();
    assert_eq!(winners, 1, "exactly one racing transition may win");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fail_sets_refunded_only_when_unit_consumed_and_eligible(pool: PgPool) {
    let owner_id = owner(&pool).await;

    RenderJobRepo::insert_pending(&pool, owner_id, 7, "rnd_consumed", true)
        .await
        .unwrap();
    let job = RenderJobRepo::fail(&pool, "rnd_consumed", "boom", true)
        .await
        .unwrap()
        .unwrap();
    assert!(job.refunded);

    RenderJobRepo::insert_pending(&pool, owner_id, 8, "rnd_unconsumed", false)
        .await
        .unwrap();
    let job = RenderJobRepo::fail(&pool, "rnd_unconsumed", "boom", true)
        .await
        .unwrap()
        .unwrap();
    assert!(!job.refunded, "no unit consumed, nothing to refund");

    RenderJobRepo::insert_pending(&pool, owner_id, 9, "rnd_subscriber", true)
        .await
        .unwrap();
    let job = RenderJobRepo::fail(&pool, "rnd_subscriber", "boom", false)
        .await
        .unwrap()
        .unwrap();
    assert!(!job.refunded, "subscriber failures never refund");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listing_is_newest_first_and_paged(pool: PgPool) {
    let owner_id = owner(&pool).await;
    for i in 0..3 {
        RenderJobRepo::insert_pending(&pool, owner_id, i, &format!("rnd_{i}"), true)
            .await
            .unwrap();
    }

    let page = RenderJobRepo::list_by_owner(
        &pool,
        owner_id,
        &JobListQuery {
            limit: Some(2),
            offset: Some(0),
        },
    )
    .await
    .unwrap();

    assert_eq!(page.len(), 2);
    assert!(page[0].created_at >= page[1].created_at);
}
