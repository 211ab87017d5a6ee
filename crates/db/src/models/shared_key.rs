//! Models for shared keys (one-time access delegations).

use serde::{Deserialize, Serialize};
use smartbox_core::delegation::KeyState;
use smartbox_core::status::StatusId;
use smartbox_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `shared_keys` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SharedKey {
    pub id: DbId,
    pub rent_id: DbId,
    pub sender_id: DbId,
    pub receiver_phone: String,
    pub shared_at: Timestamp,
    pub expires_at: Timestamp,
    pub used_at: Option<Timestamp>,
}

impl SharedKey {
    pub fn state(&self, now: Timestamp) -> KeyState {
        KeyState::derive(self.used_at, self.expires_at, now)
    }
}

/// A key together with the status of the rent it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct SharedKeyWithRent {
    #[sqlx(flatten)]
    pub key: SharedKey,
    pub rent_status_id: StatusId,
    pub rent_user_id: DbId,
}

/// A key that was just consumed, with the compartment it opens.
#[derive(Debug, Clone, FromRow)]
pub struct RedeemedKey {
    #[sqlx(flatten)]
    pub key: SharedKey,
    pub compartment_id: DbId,
}

/// API view of a key with its derived state.
#[derive(Debug, Clone, Serialize)]
pub struct SharedKeyView {
    #[serde(flatten)]
    pub key: SharedKey,
    pub state: &'static str,
}

impl SharedKeyView {
    pub fn at(key: SharedKey, now: Timestamp) -> Self {
        let state = key.state(now).label();
        Self { key, state }
    }
}

/// Insert payload assembled by the delegation registry.
#[derive(Debug, Clone)]
pub struct NewSharedKey {
    pub rent_id: DbId,
    pub sender_id: DbId,
    pub receiver_phone: String,
    pub shared_at: Timestamp,
    pub expires_at: Timestamp,
}

/// DTO for `POST /shared-keys`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSharedKey {
    pub rent_id: DbId,
    pub receiver_phone: String,
    pub expires_in_minutes: i64,
}

/// DTO for `POST /rents/{id}/share`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareRent {
    pub receiver_phone: String,
    pub expires_in_minutes: i64,
}
