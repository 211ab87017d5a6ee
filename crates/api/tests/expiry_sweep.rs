//! Tests for the expiry sweep: overdue rents are completed and their
//! compartments freed, everything else is left alone, and sweeps never
//! overlap.

mod common;

use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::Utc;
use axum::http::StatusCode;
use common::{
    body_json, compartment_status, create_long_term, create_short_term, post_json,
    seed_compartment, seed_user,
};
use rust_decimal::Decimal;
use smartbox_api::background::expiry_sweep::{ExpirySweeper, SweepSkipped, SWEEP_LOCK_KEY};
use smartbox_core::types::DbId;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

async fn end_in_past(pool: &PgPool, rent_id: DbId) {
    sqlx::query(
        "UPDATE rents
         SET start_time = NOW() - INTERVAL '2 hours', end_time = NOW() - INTERVAL '10 minutes'
         WHERE id = $1",
    )
    .bind(rent_id)
    .execute(pool)
    .await
    .unwrap();
}

async fn rent_status(pool: &PgPool, rent_id: DbId) -> (i16, Option<Decimal>) {
    sqlx::query_as("SELECT status_id, total_cost FROM rents WHERE id = $1")
        .bind(rent_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn sweeper(pool: &PgPool) -> ExpirySweeper {
    ExpirySweeper::new(pool.clone(), StdDuration::from_secs(300))
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_completes_overdue_rents_and_frees_compartments(pool: PgPool) {
    let user = seed_user(&pool, "0912345678").await;
    let overdue_slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let future_slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let open_slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let app = common::build_test_app(pool.clone());
    let overdue = create_long_term(&app, &user, overdue_slot, 2).await;
    let future = create_long_term(&app, &user, future_slot, 2).await;
    let open_ended = create_short_term(&app, &user, open_slot).await;
    end_in_past(&pool, overdue).await;

    let report = sweeper(&pool).trigger(Utc::now()).await.unwrap();

    let report = assert_matches!(report, Ok(report) => report);
    assert_eq!(report.scanned, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 0);

    // Completed at its fixed cost, compartment back in the pool.
    assert_eq!(rent_status(&pool, overdue).await, (0, Some(Decimal::from(20))));
    assert_eq!(compartment_status(&pool, overdue_slot).await, 1);

    // Rents that have not ended, or never end on their own, are untouched.
    assert_eq!(rent_status(&pool, future).await.0, 1);
    assert_eq!(compartment_status(&pool, future_slot).await, 0);
    assert_eq!(rent_status(&pool, open_ended).await, (1, None));
    assert_eq!(compartment_status(&pool, open_slot).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_sweep_finds_nothing(pool: PgPool) {
    let user = seed_user(&pool, "0912345678").await;
    let slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let app = common::build_test_app(pool.clone());
    let rent_id = create_long_term(&app, &user, slot, 1).await;
    end_in_past(&pool, rent_id).await;
    let sweeper = sweeper(&pool);

    sweeper.trigger(Utc::now()).await.unwrap().unwrap();
    let report = sweeper.trigger(Utc::now()).await.unwrap().unwrap();

    assert_eq!(report.scanned, 0);
    assert_eq!(report.completed, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_skips_while_another_instance_holds_the_lock(pool: PgPool) {
    let user = seed_user(&pool, "0912345678").await;
    let slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let app = common::build_test_app(pool.clone());
    let rent_id = create_long_term(&app, &user, slot, 1).await;
    end_in_past(&pool, rent_id).await;

    let mut other_instance = pool.acquire().await.unwrap();
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SWEEP_LOCK_KEY)
        .execute(&mut *other_instance)
        .await
        .unwrap();

    let outcome = sweeper(&pool).trigger(Utc::now()).await.unwrap();
    assert_eq!(outcome, Err(SweepSkipped::LockedElsewhere));
    assert_eq!(rent_status(&pool, rent_id).await.0, 1);

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SWEEP_LOCK_KEY)
        .execute(&mut *other_instance)
        .await
        .unwrap();
    let report = sweeper(&pool).trigger(Utc::now()).await.unwrap().unwrap();
    assert_eq!(report.completed, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn overlapping_triggers_in_one_process_run_once(pool: PgPool) {
    let sweeper = sweeper(&pool);

    let (first, second) = tokio::join!(sweeper.trigger(Utc::now()), sweeper.trigger(Utc::now()));

    assert_matches!(first.unwrap(), Ok(_));
    assert_eq!(second.unwrap(), Err(SweepSkipped::AlreadyRunning));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn one_run_drains_more_rents_than_a_batch(pool: PgPool) {
    let user = seed_user(&pool, "0912345678").await;
    let app = common::build_test_app(pool.clone());
    let mut rents = Vec::new();
    for _ in 0..5 {
        let slot = seed_compartment(&pool, Decimal::from(10), None).await;
        let rent_id = create_long_term(&app, &user, slot, 1).await;
        end_in_past(&pool, rent_id).await;
        rents.push(rent_id);
    }

    let report = sweeper(&pool)
        .with_batch_size(2)
        .trigger(Utc::now())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.scanned, 5);
    assert_eq!(report.completed, 5);
    for rent_id in rents {
        assert_eq!(rent_status(&pool, rent_id).await.0, 0);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stuck_rent_does_not_block_later_ones(pool: PgPool) {
    let user = seed_user(&pool, "0912345678").await;
    let stuck_slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let later_slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let app = common::build_test_app(pool.clone());
    let stuck = create_long_term(&app, &user, stuck_slot, 1).await;
    let later = create_long_term(&app, &user, later_slot, 1).await;
    end_in_past(&pool, stuck).await;
    end_in_past(&pool, later).await;
    // The stuck rent sorts first.
    sqlx::query("UPDATE rents SET end_time = end_time - INTERVAL '5 minutes' WHERE id = $1")
        .bind(stuck)
        .execute(&pool)
        .await
        .unwrap();

    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM rents WHERE id = $1 FOR UPDATE")
        .bind(stuck)
        .execute(&mut *holder)
        .await
        .unwrap();

    let report = sweeper(&pool)
        .with_batch_size(1)
        .trigger(Utc::now())
        .await
        .unwrap()
        .unwrap();
    holder.rollback().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(rent_status(&pool, stuck).await.0, 1);
    assert_eq!(rent_status(&pool, later).await.0, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cancelled_sweep_leaves_rents_for_the_next_run(pool: PgPool) {
    let user = seed_user(&pool, "0912345678").await;
    let slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let app = common::build_test_app(pool.clone());
    let rent_id = create_long_term(&app, &user, slot, 1).await;
    end_in_past(&pool, rent_id).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = sweeper(&pool)
        .with_cancellation(cancel)
        .trigger(Utc::now())
        .await
        .unwrap()
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.completed, 0);
    assert_eq!(rent_status(&pool, rent_id).await.0, 1);

    let report = sweeper(&pool).trigger(Utc::now()).await.unwrap().unwrap();
    assert!(!report.interrupted);
    assert_eq!(report.completed, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn swept_long_term_rent_can_still_be_paid(pool: PgPool) {
    let user = seed_user(&pool, "0912345678").await;
    let slot = seed_compartment(&pool, Decimal::from(10), None).await;
    let app = common::build_test_app(pool.clone());
    let rent_id = create_long_term(&app, &user, slot, 2).await;
    end_in_past(&pool, rent_id).await;
    sweeper(&pool).trigger(Utc::now()).await.unwrap().unwrap();

    let response = post_json(
        &app,
        &format!("/api/v1/payments/rents/{rent_id}/pay"),
        &user.token,
        serde_json::json!({ "method": "card" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["amount"], 20.0);
}
