//! Default compartment actuator.

use async_trait::async_trait;
use smartbox_core::actuator::{CompartmentActuator, OpenReason};
use smartbox_core::error::CoreError;
use smartbox_core::types::DbId;

/// Actuator for deployments without a hardware bridge: records every open
/// signal in the trace log and always succeeds.
#[derive(Debug, Default, Clone)]
pub struct LoggingActuator;

#[async_trait]
impl CompartmentActuator for LoggingActuator {
    async fn open(&self, compartment_id: DbId, reason: OpenReason) -> Result<(), CoreError> {
        tracing::info!(
            compartment_id,
            rent_id = reason.rent_id(),
            reason = reason.label(),
            "Open signal dispatched"
        );
        Ok(())
    }
}
