use serde::{Deserialize, Serialize};
use smartbox_core::error::CoreError;
use smartbox_core::payment::{CallbackStatus, PaymentMethod, PaymentStatus};
use smartbox_core::types::{DbId, Money, Timestamp};
use sqlx::FromRow;

/// A row from the `payments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: DbId,
    pub rent_id: DbId,
    pub amount: Money,
    pub method: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub payment_time: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Payment {
    pub fn status(&self) -> Result<PaymentStatus, CoreError> {
        self.status.parse()
    }
}

/// Insert payload for a payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub rent_id: DbId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// DTO for `POST /payments/rents/{rent_id}/pay`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePayment {
    pub method: PaymentMethod,
    /// If supplied, must equal the amount due.
    pub amount: Option<Money>,
}

/// DTO for `POST /payments/callback`, sent by the payment collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
    pub rent_id: DbId,
    pub status: CallbackStatus,
    pub transaction_id: String,
}

/// DTO for `POST /rents/{id}/receiver-payment`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverPayment {
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
}
