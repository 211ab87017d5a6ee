//! Seam to the hardware that physically opens a compartment.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::DbId;

/// Why a compartment is being opened. Carried through to the actuator so the
/// device log can attribute every open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenReason {
    /// The renter opened their own long-term compartment.
    OwnerAccess { rent_id: DbId },
    /// A receiver redeemed a shared key.
    SharedKey { rent_id: DbId, shared_id: DbId },
    /// A delivery receiver paid and is collecting the parcel.
    DeliveryPickup { rent_id: DbId },
}

impl OpenReason {
    pub fn rent_id(&self) -> DbId {
        match *self {
            OpenReason::OwnerAccess { rent_id }
            | OpenReason::SharedKey { rent_id, .. }
            | OpenReason::DeliveryPickup { rent_id } => rent_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OpenReason::OwnerAccess { .. } => "owner_access",
            OpenReason::SharedKey { .. } => "shared_key",
            OpenReason::DeliveryPickup { .. } => "delivery_pickup",
        }
    }
}

/// Sends the open signal to a compartment.
///
/// Implementations are called while the caller's transaction is still open;
/// returning an error rolls the triggering change back. Failures should be
/// reported as [`CoreError::Upstream`].
#[async_trait]
pub trait CompartmentActuator: Send + Sync {
    async fn open(&self, compartment_id: DbId, reason: OpenReason) -> Result<(), CoreError>;
}
