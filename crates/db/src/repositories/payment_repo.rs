//! Repository for the `payments` table.

use smartbox_core::payment::PaymentStatus;
use smartbox_core::types::{DbId, Timestamp};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::payment::{NewPayment, Payment};

const COLUMNS: &str = "id, rent_id, amount, method, status, transaction_id, payment_time, \
    created_at, updated_at";

pub struct PaymentRepo;

impl PaymentRepo {
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &NewPayment,
    ) -> Result<Payment, sqlx::Error> {
        let query = format!(
            "INSERT INTO payments (rent_id, amount, method, status, transaction_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(input.rent_id)
            .bind(input.amount)
            .bind(input.method.as_str())
            .bind(input.status.as_str())
            .bind(&input.transaction_id)
            .fetch_one(&mut **tx)
            .await
    }

    /// Whether the rent already has a settled payment.
    pub async fn has_paid(
        tx: &mut Transaction<'_, Postgres>,
        rent_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM payments WHERE rent_id = $1 AND status = $2)",
        )
        .bind(rent_id)
        .bind(PaymentStatus::Paid.as_str())
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.0)
    }

    pub async fn find_by_transaction_id(
        tx: &mut Transaction<'_, Postgres>,
        transaction_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payments WHERE transaction_id = $1");
        sqlx::query_as::<_, Payment>(&query)
            .bind(transaction_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Lock the most recent pending payment for a rent.
    pub async fn lock_latest_pending(
        tx: &mut Transaction<'_, Postgres>,
        rent_id: DbId,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payments
             WHERE rent_id = $1 AND status = $2
             ORDER BY created_at DESC, id DESC
             LIMIT 1
             FOR UPDATE"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(rent_id)
            .bind(PaymentStatus::Pending.as_str())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Apply a reported outcome to a payment.
    pub async fn set_outcome(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        status: PaymentStatus,
        transaction_id: &str,
        at: Timestamp,
    ) -> Result<Payment, sqlx::Error> {
        let query = format!(
            "UPDATE payments SET status = $2, transaction_id = $3, payment_time = $4
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(transaction_id)
            .bind(at)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payments WHERE id = $1");
        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Every payment attempt for a rent, most recent first.
    pub async fn list_by_rent(pool: &PgPool, rent_id: DbId) -> Result<Vec<Payment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payments WHERE rent_id = $1 ORDER BY payment_time DESC, id DESC"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(rent_id)
            .fetch_all(pool)
            .await
    }
}
