//! Repository for the `rents` table.

use smartbox_core::rental::RentalType;
use smartbox_core::status::RentStatus;
use smartbox_core::types::{DbId, Money, Timestamp};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::rent::{NewRent, Rent};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, compartment_id, start_time, end_time, pickup_time, \
    price_per_hour, total_cost, status_id, rental_type, receiver_phone, created_at, updated_at";

/// Rent ledger storage. Status changes go through the engine, which holds
/// the row lock while deciding what to write.
pub struct RentRepo;

impl RentRepo {
    // ── Writes (transaction-scoped) ─────────────────────────────────

    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &NewRent,
    ) -> Result<Rent, sqlx::Error> {
        let query = format!(
            "INSERT INTO rents
                (user_id, compartment_id, start_time, end_time, price_per_hour,
                 total_cost, status_id, rental_type, receiver_phone)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Rent>(&query)
            .bind(input.user_id)
            .bind(input.compartment_id)
            .bind(input.start_time)
            .bind(input.end_time)
            .bind(input.price_per_hour)
            .bind(input.total_cost)
            .bind(RentStatus::Active.id())
            .bind(input.rental_type.as_str())
            .bind(&input.receiver_phone)
            .fetch_one(&mut **tx)
            .await
    }

    /// Load a rent and hold an exclusive row lock until the transaction ends.
    pub async fn lock_by_id(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<Rent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rents WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Rent>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Load a rent under a share lock: its status cannot change until the
    /// transaction ends, but other readers are not blocked.
    pub async fn share_lock_by_id(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<Rent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rents WHERE id = $1 FOR SHARE");
        sqlx::query_as::<_, Rent>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Lock an active, unclosed delivery addressed to `receiver_phone`.
    pub async fn lock_pending_delivery(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        receiver_phone: &str,
    ) -> Result<Option<Rent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rents
             WHERE id = $1
               AND receiver_phone = $2
               AND rental_type = $3
               AND status_id = $4
               AND end_time IS NULL
             FOR UPDATE"
        );
        sqlx::query_as::<_, Rent>(&query)
            .bind(id)
            .bind(receiver_phone)
            .bind(RentalType::Delivery.as_str())
            .bind(RentStatus::Active.id())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Lock a rent for the expiry sweep, re-checking that it is still active
    /// and overdue. Rows locked by a concurrent request are skipped; the next
    /// sweep picks them up.
    pub async fn lock_overdue(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        now: Timestamp,
    ) -> Result<Option<Rent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rents
             WHERE id = $1 AND status_id = $2 AND end_time < $3
             FOR UPDATE SKIP LOCKED"
        );
        sqlx::query_as::<_, Rent>(&query)
            .bind(id)
            .bind(RentStatus::Active.id())
            .bind(now)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Move a rent to a terminal status.
    ///
    /// `pickup_time` is only overwritten when `Some`.
    pub async fn close(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        status: RentStatus,
        end_time: Timestamp,
        pickup_time: Option<Timestamp>,
        total_cost: Money,
    ) -> Result<Rent, sqlx::Error> {
        let query = format!(
            "UPDATE rents SET
                status_id = $2,
                end_time = $3,
                pickup_time = COALESCE($4, pickup_time),
                total_cost = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Rent>(&query)
            .bind(id)
            .bind(status.id())
            .bind(end_time)
            .bind(pickup_time)
            .bind(total_cost)
            .fetch_one(&mut **tx)
            .await
    }

    /// Record physical access without changing status, term or cost.
    pub async fn record_pickup(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        at: Timestamp,
    ) -> Result<Rent, sqlx::Error> {
        let query = format!("UPDATE rents SET pickup_time = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Rent>(&query)
            .bind(id)
            .bind(at)
            .fetch_one(&mut **tx)
            .await
    }

    /// Permanently delete a rent. Its keys and payments cascade.
    pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rents WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Rent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rents WHERE id = $1");
        sqlx::query_as::<_, Rent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All rents, most recent first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Rent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rents ORDER BY start_time DESC, id DESC");
        sqlx::query_as::<_, Rent>(&query).fetch_all(pool).await
    }

    /// Rents owned by `user_id`, most recent first.
    pub async fn list_by_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Rent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rents WHERE user_id = $1 ORDER BY start_time DESC, id DESC"
        );
        sqlx::query_as::<_, Rent>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Active deliveries waiting for `receiver_phone` to collect them.
    pub async fn list_pending_deliveries(
        pool: &PgPool,
        receiver_phone: &str,
    ) -> Result<Vec<Rent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rents
             WHERE receiver_phone = $1
               AND rental_type = $2
               AND status_id = $3
               AND end_time IS NULL
             ORDER BY start_time DESC, id DESC"
        );
        sqlx::query_as::<_, Rent>(&query)
            .bind(receiver_phone)
            .bind(RentalType::Delivery.as_str())
            .bind(RentStatus::Active.id())
            .fetch_all(pool)
            .await
    }

    /// Ids of active rents whose fixed term ended before `now`, oldest first,
    /// leaving out `exclude`.
    pub async fn list_overdue_ids(
        pool: &PgPool,
        now: Timestamp,
        exclude: &[DbId],
        limit: i64,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT id FROM rents
             WHERE status_id = $1 AND end_time < $2 AND NOT (id = ANY($3))
             ORDER BY end_time ASC, id ASC
             LIMIT $4",
        )
        .bind(RentStatus::Active.id())
        .bind(now)
        .bind(exclude)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
