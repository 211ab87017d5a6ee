//! Repository for the `users` table.

use smartbox_core::roles::ROLE_USER;
use smartbox_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::user::{CreateUser, User};

const COLUMNS: &str = "id, name, phone_number, email, role, created_at, updated_at";

/// Identity lookups.
pub struct UserRepo;

impl UserRepo {
    /// Insert a user. The role defaults to `user`.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (name, phone_number, email, role)
             VALUES ($1, $2, $3, COALESCE($4, '{ROLE_USER}'))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.name)
            .bind(&input.phone_number)
            .bind(&input.email)
            .bind(&input.role)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Resolve a phone number to an identity inside an open transaction.
    pub async fn find_by_phone(
        tx: &mut Transaction<'_, Postgres>,
        phone_number: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE phone_number = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(phone_number)
            .fetch_optional(&mut **tx)
            .await
    }
}
