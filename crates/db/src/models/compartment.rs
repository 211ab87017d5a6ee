use serde::Serialize;
use smartbox_core::error::CoreError;
use smartbox_core::pricing;
use smartbox_core::status::{CompartmentStatus, StatusId};
use smartbox_core::types::{DbId, Money, Timestamp};
use sqlx::FromRow;

/// A row from the `compartments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Compartment {
    pub id: DbId,
    pub locker_id: DbId,
    pub size_id: DbId,
    pub code: String,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A compartment joined with the catalog data that prices it.
#[derive(Debug, Clone, FromRow)]
pub struct CompartmentPricing {
    pub id: DbId,
    pub status_id: StatusId,
    /// `sizes.price_per_hour`.
    pub base_rate: Money,
    /// `locations.multiplier`.
    pub multiplier: Option<Money>,
}

impl CompartmentPricing {
    pub fn status(&self) -> Result<CompartmentStatus, CoreError> {
        CompartmentStatus::from_id(self.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "Compartment {} has unknown status {}",
                self.id, self.status_id
            ))
        })
    }

    /// Hourly price to snapshot onto a new rent.
    pub fn price_per_hour(&self) -> Money {
        pricing::price_per_hour(self.base_rate, self.multiplier)
    }
}
