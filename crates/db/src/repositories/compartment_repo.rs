//! Repository for the `compartments` table.
//!
//! The catalog (sizes, lockers, locations) is managed elsewhere. The rental
//! engine reads compartments with their pricing and flips occupancy.

use smartbox_core::status::CompartmentStatus;
use smartbox_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::compartment::{Compartment, CompartmentPricing};

const COLUMNS: &str = "id, locker_id, size_id, code, status_id, created_at, updated_at";

pub struct CompartmentRepo;

impl CompartmentRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Compartment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM compartments WHERE id = $1");
        sqlx::query_as::<_, Compartment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock the compartment row and read what it costs per hour.
    ///
    /// Concurrent rent creations for the same compartment queue on this lock;
    /// whoever gets it second sees the compartment already occupied.
    pub async fn lock_with_pricing(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<CompartmentPricing>, sqlx::Error> {
        sqlx::query_as::<_, CompartmentPricing>(
            "SELECT c.id, c.status_id, s.price_per_hour AS base_rate, l.multiplier
             FROM compartments c
             JOIN sizes s ON s.id = c.size_id
             JOIN lockers k ON k.id = c.locker_id
             JOIN locations l ON l.id = k.location_id
             WHERE c.id = $1
             FOR UPDATE OF c",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Mark a compartment occupied. Returns `true` if a row changed.
    pub async fn occupy(tx: &mut Transaction<'_, Postgres>, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE compartments SET status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(CompartmentStatus::Occupied.id())
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return an occupied compartment to the pool. A compartment that was
    /// moved to maintenance in the meantime stays there.
    pub async fn release(tx: &mut Transaction<'_, Postgres>, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE compartments SET status_id = $2 WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(CompartmentStatus::Available.id())
        .bind(CompartmentStatus::Occupied.id())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
