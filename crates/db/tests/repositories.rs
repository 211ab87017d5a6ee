//! Integration tests for the repository layer against a real database:
//! - Schema bootstrap and health check
//! - Row-lock helpers and the active-rent uniqueness backstop
//! - Shared-key compare-and-set redemption and retention purge
//! - Payment uniqueness per rent

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use smartbox_core::payment::{PaymentMethod, PaymentStatus};
use smartbox_core::rental::RentalType;
use smartbox_core::status::{CompartmentStatus, RentStatus};
use smartbox_core::types::{DbId, Timestamp};
use smartbox_db::models::payment::NewPayment;
use smartbox_db::models::rent::NewRent;
use smartbox_db::models::shared_key::NewSharedKey;
use smartbox_db::models::user::CreateUser;
use smartbox_db::repositories::{
    CompartmentRepo, PaymentRepo, RentRepo, SharedKeyRepo, UserRepo,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, phone: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            name: format!("User {phone}"),
            phone_number: phone.to_string(),
            email: None,
            role: None,
        },
    )
    .await
    .unwrap()
    .id
}

/// Seed a location/size/locker chain and one available compartment.
async fn seed_compartment(pool: &PgPool, base_rate: Decimal, multiplier: Option<Decimal>) -> DbId {
    let (location_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO locations (name, address, multiplier) VALUES ('Depot', '1 Main St', $1) RETURNING id",
    )
    .bind(multiplier)
    .fetch_one(pool)
    .await
    .unwrap();
    let (size_id,): (DbId,) =
        sqlx::query_as("INSERT INTO sizes (name, price_per_hour) VALUES ('M', $1) RETURNING id")
            .bind(base_rate)
            .fetch_one(pool)
            .await
            .unwrap();
    let (locker_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO lockers (code, location_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("LK-{location_id}"))
    .bind(location_id)
    .fetch_one(pool)
    .await
    .unwrap();
    let (compartment_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO compartments (locker_id, size_id, code) VALUES ($1, $2, 'A1') RETURNING id",
    )
    .bind(locker_id)
    .bind(size_id)
    .fetch_one(pool)
    .await
    .unwrap();
    compartment_id
}

fn new_rent(user_id: DbId, compartment_id: DbId, end_time: Option<Timestamp>) -> NewRent {
    NewRent {
        user_id,
        compartment_id,
        start_time: Utc::now(),
        end_time,
        price_per_hour: Decimal::from(10),
        total_cost: end_time.map(|_| Decimal::from(10)),
        rental_type: if end_time.is_some() {
            RentalType::LongTerm
        } else {
            RentalType::ShortTerm
        },
        receiver_phone: None,
    }
}

async fn insert_rent(pool: &PgPool, input: &NewRent) -> DbId {
    let mut tx = pool.begin().await.unwrap();
    let rent = RentRepo::insert(&mut tx, input).await.unwrap();
    tx.commit().await.unwrap();
    rent.id
}

async fn insert_key(pool: &PgPool, rent_id: DbId, sender_id: DbId, phone: &str, ttl: Duration) -> DbId {
    let now = Utc::now();
    let mut tx = pool.begin().await.unwrap();
    let key = SharedKeyRepo::insert(
        &mut tx,
        &NewSharedKey {
            rent_id,
            sender_id,
            receiver_phone: phone.to_string(),
            shared_at: now,
            expires_at: now + ttl,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    key.id
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bootstrap_creates_schema(pool: PgPool) {
    smartbox_db::health_check(&pool).await.unwrap();

    for table in ["users", "locations", "sizes", "lockers", "compartments", "rents", "shared_keys", "payments"] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

// ---------------------------------------------------------------------------
// Compartments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lock_with_pricing_reads_catalog(pool: PgPool) {
    let id = seed_compartment(&pool, Decimal::from(10), Some(Decimal::new(150, 2))).await;

    let mut tx = pool.begin().await.unwrap();
    let pricing = CompartmentRepo::lock_with_pricing(&mut tx, id).await.unwrap().unwrap();
    assert_eq!(pricing.status().unwrap(), CompartmentStatus::Available);
    assert_eq!(pricing.price_per_hour(), Decimal::from(15));

    assert!(CompartmentRepo::lock_with_pricing(&mut tx, id + 1000).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_release_leaves_maintenance_alone(pool: PgPool) {
    let id = seed_compartment(&pool, Decimal::from(10), None).await;
    sqlx::query("UPDATE compartments SET status_id = 2 WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    assert!(!CompartmentRepo::release(&mut tx, id).await.unwrap());
    tx.commit().await.unwrap();

    let compartment = CompartmentRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(compartment.status_id, CompartmentStatus::Maintenance.id());
}

// ---------------------------------------------------------------------------
// Rents
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_second_active_rent_violates_unique_index(pool: PgPool) {
    let user = seed_user(&pool, "0901000001").await;
    let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
    insert_rent(&pool, &new_rent(user, compartment, None)).await;

    let mut tx = pool.begin().await.unwrap();
    let err = RentRepo::insert(&mut tx, &new_rent(user, compartment, None))
        .await
        .unwrap_err();
    assert_matches!(
        &err,
        sqlx::Error::Database(db) if db.constraint() == Some("uq_rents_active_compartment")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_closed_rent_frees_the_unique_slot(pool: PgPool) {
    let user = seed_user(&pool, "0901000002").await;
    let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
    let first = insert_rent(&pool, &new_rent(user, compartment, None)).await;

    let mut tx = pool.begin().await.unwrap();
    let now = Utc::now();
    let closed = RentRepo::close(&mut tx, first, RentStatus::Completed, now, Some(now), Decimal::from(10))
        .await
        .unwrap();
    assert_eq!(closed.status_id, RentStatus::Completed.id());
    assert!(closed.pickup_time.is_some());
    RentRepo::insert(&mut tx, &new_rent(user, compartment, None))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(RentRepo::list_by_user(&pool, user).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overdue_listing_skips_open_ended_and_future(pool: PgPool) {
    let user = seed_user(&pool, "0901000003").await;
    let now = Utc::now();

    let past = seed_compartment(&pool, Decimal::from(10), None).await;
    let future = seed_compartment(&pool, Decimal::from(10), None).await;
    let open = seed_compartment(&pool, Decimal::from(10), None).await;

    let mut overdue = new_rent(user, past, Some(now - Duration::minutes(10)));
    overdue.start_time = now - Duration::hours(2);
    let overdue_id = insert_rent(&pool, &overdue).await;
    insert_rent(&pool, &new_rent(user, future, Some(now + Duration::hours(1)))).await;
    insert_rent(&pool, &new_rent(user, open, None)).await;

    let ids = RentRepo::list_overdue_ids(&pool, now, &[], 100).await.unwrap();
    assert_eq!(ids, vec![overdue_id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overdue_listing_honours_exclusions(pool: PgPool) {
    let user = seed_user(&pool, "0901000003").await;
    let now = Utc::now();

    let mut ids = Vec::new();
    for minutes in [30, 20, 10] {
        let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
        let mut rent = new_rent(user, compartment, Some(now - Duration::minutes(minutes)));
        rent.start_time = now - Duration::hours(2);
        ids.push(insert_rent(&pool, &rent).await);
    }

    let listed = RentRepo::list_overdue_ids(&pool, now, &[ids[0]], 1).await.unwrap();
    assert_eq!(listed, vec![ids[1]]);
    let listed = RentRepo::list_overdue_ids(&pool, now, &ids[..2], 10).await.unwrap();
    assert_eq!(listed, vec![ids[2]]);
}

// ---------------------------------------------------------------------------
// Shared keys
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_redeem_succeeds_once(pool: PgPool) {
    let owner = seed_user(&pool, "0901000004").await;
    let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
    let rent = insert_rent(&pool, &new_rent(owner, compartment, None)).await;
    let key = insert_key(&pool, rent, owner, "0912345678", Duration::minutes(30)).await;

    let mut tx = pool.begin().await.unwrap();
    let redeemed = SharedKeyRepo::redeem(&mut tx, key, "0912345678", Utc::now())
        .await
        .unwrap()
        .expect("first redemption should match");
    assert_eq!(redeemed.compartment_id, compartment);
    assert!(redeemed.key.used_at.is_some());
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let again = SharedKeyRepo::redeem(&mut tx, key, "0912345678", Utc::now())
        .await
        .unwrap();
    assert!(again.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_redeem_rejects_wrong_phone_and_expired(pool: PgPool) {
    let owner = seed_user(&pool, "0901000005").await;
    let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
    let rent = insert_rent(&pool, &new_rent(owner, compartment, None)).await;
    let key = insert_key(&pool, rent, owner, "0912345678", Duration::minutes(5)).await;

    let mut tx = pool.begin().await.unwrap();
    assert!(SharedKeyRepo::redeem(&mut tx, key, "0999999999", Utc::now())
        .await
        .unwrap()
        .is_none());
    let later = Utc::now() + Duration::minutes(6);
    assert!(SharedKeyRepo::redeem(&mut tx, key, "0912345678", later)
        .await
        .unwrap()
        .is_none());

    let diagnosis = SharedKeyRepo::find_with_rent(&mut tx, key).await.unwrap().unwrap();
    assert!(diagnosis.key.used_at.is_none());
    assert_eq!(diagnosis.rent_status_id, RentStatus::Active.id());
    assert_eq!(diagnosis.rent_user_id, owner);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_receiver_listing_hides_used_and_expired(pool: PgPool) {
    let owner = seed_user(&pool, "0901000006").await;
    let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
    let rent = insert_rent(&pool, &new_rent(owner, compartment, None)).await;

    let older = insert_key(&pool, rent, owner, "0912345678", Duration::minutes(30)).await;
    let newer = insert_key(&pool, rent, owner, "0912345678", Duration::minutes(60)).await;
    let used = insert_key(&pool, rent, owner, "0912345678", Duration::minutes(60)).await;
    sqlx::query("UPDATE shared_keys SET used_at = NOW() WHERE id = $1")
        .bind(used)
        .execute(&pool)
        .await
        .unwrap();

    let listed: Vec<DbId> =
        SharedKeyRepo::list_unused_by_receiver(&pool, "0912345678", Utc::now())
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.id)
            .collect();
    assert_eq!(listed, vec![newer, older]);

    let later = Utc::now() + Duration::minutes(45);
    let listed = SharedKeyRepo::list_unused_by_receiver(&pool, "0912345678", later)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, newer);

    assert_eq!(SharedKeyRepo::list_by_rent(&pool, rent).await.unwrap().len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_purge_removes_only_long_expired_keys(pool: PgPool) {
    let owner = seed_user(&pool, "0901000007").await;
    let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
    let rent = insert_rent(&pool, &new_rent(owner, compartment, None)).await;
    let keep = insert_key(&pool, rent, owner, "0912345678", Duration::minutes(30)).await;
    let stale = insert_key(&pool, rent, owner, "0912345678", Duration::minutes(30)).await;
    sqlx::query(
        "UPDATE shared_keys SET shared_at = NOW() - INTERVAL '9 days',
                                expires_at = NOW() - INTERVAL '8 days'
         WHERE id = $1",
    )
    .bind(stale)
    .execute(&pool)
    .await
    .unwrap();

    let cutoff = Utc::now() - Duration::days(7);
    let purged = SharedKeyRepo::purge_expired_before(&pool, cutoff).await.unwrap();
    assert_eq!(purged, 1);
    assert!(SharedKeyRepo::find_by_id(&pool, keep).await.unwrap().is_some());
    assert!(SharedKeyRepo::find_by_id(&pool, stale).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rent_is_paid_at_most_once(pool: PgPool) {
    let owner = seed_user(&pool, "0901000008").await;
    let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
    let rent = insert_rent(&pool, &new_rent(owner, compartment, Some(Utc::now()))).await;

    let paid = |txid: &str| NewPayment {
        rent_id: rent,
        amount: Decimal::from(10),
        method: PaymentMethod::Cash,
        status: PaymentStatus::Paid,
        transaction_id: Some(txid.to_string()),
    };

    let mut tx = pool.begin().await.unwrap();
    assert!(!PaymentRepo::has_paid(&mut tx, rent).await.unwrap());
    PaymentRepo::insert(&mut tx, &paid("tx-1")).await.unwrap();
    assert!(PaymentRepo::has_paid(&mut tx, rent).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let err = PaymentRepo::insert(&mut tx, &paid("tx-2")).await.unwrap_err();
    assert_matches!(
        &err,
        sqlx::Error::Database(db) if db.constraint() == Some("uq_payments_paid_rent")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_latest_pending_payment_is_locked(pool: PgPool) {
    let owner = seed_user(&pool, "0901000009").await;
    let compartment = seed_compartment(&pool, Decimal::from(10), None).await;
    let rent = insert_rent(&pool, &new_rent(owner, compartment, Some(Utc::now()))).await;

    let pending = NewPayment {
        rent_id: rent,
        amount: Decimal::from(10),
        method: PaymentMethod::Momo,
        status: PaymentStatus::Pending,
        transaction_id: None,
    };

    let mut tx = pool.begin().await.unwrap();
    PaymentRepo::insert(&mut tx, &pending).await.unwrap();
    let second = PaymentRepo::insert(&mut tx, &pending).await.unwrap();

    let latest = PaymentRepo::lock_latest_pending(&mut tx, rent).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);

    let settled = PaymentRepo::set_outcome(&mut tx, latest.id, PaymentStatus::Failed, "tx-9", Utc::now())
        .await
        .unwrap();
    assert_eq!(settled.status().unwrap(), PaymentStatus::Failed);
    let found = PaymentRepo::find_by_transaction_id(&mut tx, "tx-9").await.unwrap().unwrap();
    assert_eq!(found.id, second.id);
}
