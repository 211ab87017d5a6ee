//! Repository for the `shared_keys` table.

use smartbox_core::status::RentStatus;
use smartbox_core::types::{DbId, Timestamp};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::shared_key::{NewSharedKey, RedeemedKey, SharedKey, SharedKeyWithRent};

const COLUMNS: &str = "id, rent_id, sender_id, receiver_phone, shared_at, expires_at, used_at";

/// Same columns qualified with the `sk` alias, for joins.
const SK_COLUMNS: &str = "sk.id, sk.rent_id, sk.sender_id, sk.receiver_phone, \
    sk.shared_at, sk.expires_at, sk.used_at";

pub struct SharedKeyRepo;

impl SharedKeyRepo {
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &NewSharedKey,
    ) -> Result<SharedKey, sqlx::Error> {
        let query = format!(
            "INSERT INTO shared_keys (rent_id, sender_id, receiver_phone, shared_at, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SharedKey>(&query)
            .bind(input.rent_id)
            .bind(input.sender_id)
            .bind(&input.receiver_phone)
            .bind(input.shared_at)
            .bind(input.expires_at)
            .fetch_one(&mut **tx)
            .await
    }

    /// Consume a key in one compare-and-set.
    ///
    /// Succeeds only if the key belongs to `receiver_phone`, has not been
    /// used, has not expired at `now`, and its rent is still active. Two
    /// concurrent callers cannot both succeed: the loser re-evaluates the
    /// predicate against the winner's `used_at` and matches nothing.
    pub async fn redeem(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        receiver_phone: &str,
        now: Timestamp,
    ) -> Result<Option<RedeemedKey>, sqlx::Error> {
        let query = format!(
            "UPDATE shared_keys sk SET used_at = $3
             FROM rents r
             WHERE sk.id = $1
               AND sk.receiver_phone = $2
               AND sk.used_at IS NULL
               AND sk.expires_at >= $3
               AND r.id = sk.rent_id
               AND r.status_id = $4
             RETURNING {SK_COLUMNS}, r.compartment_id"
        );
        sqlx::query_as::<_, RedeemedKey>(&query)
            .bind(id)
            .bind(receiver_phone)
            .bind(now)
            .bind(RentStatus::Active.id())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Read a key with its rent's status, to explain why a redemption
    /// matched nothing.
    pub async fn find_with_rent(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<SharedKeyWithRent>, sqlx::Error> {
        let query = format!(
            "SELECT {SK_COLUMNS}, r.status_id AS rent_status_id, r.user_id AS rent_user_id
             FROM shared_keys sk
             JOIN rents r ON r.id = sk.rent_id
             WHERE sk.id = $1"
        );
        sqlx::query_as::<_, SharedKeyWithRent>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Lock a key together with its rent's owner, for revocation.
    pub async fn lock_with_rent(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<SharedKeyWithRent>, sqlx::Error> {
        let query = format!(
            "SELECT {SK_COLUMNS}, r.status_id AS rent_status_id, r.user_id AS rent_user_id
             FROM shared_keys sk
             JOIN rents r ON r.id = sk.rent_id
             WHERE sk.id = $1
             FOR UPDATE OF sk"
        );
        sqlx::query_as::<_, SharedKeyWithRent>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM shared_keys WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SharedKey>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM shared_keys WHERE id = $1");
        sqlx::query_as::<_, SharedKey>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Every key issued for a rent, most recent first.
    pub async fn list_by_rent(pool: &PgPool, rent_id: DbId) -> Result<Vec<SharedKey>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM shared_keys WHERE rent_id = $1 ORDER BY shared_at DESC, id DESC"
        );
        sqlx::query_as::<_, SharedKey>(&query)
            .bind(rent_id)
            .fetch_all(pool)
            .await
    }

    /// Keys addressed to `receiver_phone` that are still redeemable at `now`,
    /// most recent first.
    pub async fn list_unused_by_receiver(
        pool: &PgPool,
        receiver_phone: &str,
        now: Timestamp,
    ) -> Result<Vec<SharedKey>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM shared_keys
             WHERE receiver_phone = $1 AND used_at IS NULL AND expires_at >= $2
             ORDER BY shared_at DESC, id DESC"
        );
        sqlx::query_as::<_, SharedKey>(&query)
            .bind(receiver_phone)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Delete keys whose deadline passed before `cutoff`. Returns the number
    /// of rows removed.
    pub async fn purge_expired_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM shared_keys WHERE expires_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
