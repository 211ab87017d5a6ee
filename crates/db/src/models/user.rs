use serde::{Deserialize, Serialize};
use smartbox_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a user. Used by provisioning and tests; registration
/// proper is handled outside this service.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    /// Defaults to `user`.
    pub role: Option<String>,
}
