//! Models for rents: the authoritative record of who holds which
//! compartment, for how long, and at what price.

use serde::{Deserialize, Serialize};
use smartbox_core::error::CoreError;
use smartbox_core::rental::{RentFacts, RentalType};
use smartbox_core::status::{self, RentStatus, StatusId};
use smartbox_core::types::{DbId, Money, Timestamp};
use sqlx::FromRow;

/// A row from the `rents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Rent {
    pub id: DbId,
    pub user_id: DbId,
    pub compartment_id: DbId,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub pickup_time: Option<Timestamp>,
    pub price_per_hour: Money,
    pub total_cost: Option<Money>,
    pub status_id: StatusId,
    pub rental_type: String,
    pub receiver_phone: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Rent {
    pub fn status(&self) -> Result<RentStatus, CoreError> {
        status::rent_status(self.status_id)
    }

    pub fn rental_type(&self) -> Result<RentalType, CoreError> {
        self.rental_type.parse().map_err(|_| {
            CoreError::Internal(format!(
                "Rent {} has unknown rental type '{}'",
                self.id, self.rental_type
            ))
        })
    }

    /// Decode the fields the domain guards inspect.
    pub fn facts(&self) -> Result<RentFacts, CoreError> {
        Ok(RentFacts {
            id: self.id,
            status: self.status()?,
            rental_type: self.rental_type()?,
            start_time: self.start_time,
            end_time: self.end_time,
            price_per_hour: self.price_per_hour,
            total_cost: self.total_cost,
        })
    }

    pub fn is_owned_by(&self, user_id: DbId) -> bool {
        self.user_id == user_id
    }
}

/// Insert payload assembled by the ledger once the rental is planned.
#[derive(Debug, Clone)]
pub struct NewRent {
    pub user_id: DbId,
    pub compartment_id: DbId,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub price_per_hour: Money,
    pub total_cost: Option<Money>,
    pub rental_type: RentalType,
    pub receiver_phone: Option<String>,
}

/// DTO for `POST /rents`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRent {
    pub compartment_id: DbId,
    /// Fixed term in hours. Present means long-term.
    pub rental_hours: Option<i32>,
    pub rental_type: Option<RentalType>,
    /// Required when `rental_type` is `delivery`.
    pub receiver_phone: Option<String>,
}

/// DTO for `POST /rents/delivery`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeliveryRent {
    pub compartment_id: DbId,
    pub receiver_phone: String,
}

/// DTO for `PUT /rents/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRentStatus {
    pub status_id: StatusId,
}
