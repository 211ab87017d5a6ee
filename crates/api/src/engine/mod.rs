//! Rental engine.
//!
//! Every multi-step mutation lives here and runs inside one explicit
//! transaction: rows are locked, domain rules from `smartbox_core` decide
//! what to write, and the transaction commits only when every step
//! succeeded. An early return drops the transaction, which rolls it back.
//!
//! - [`ledger`] -- rent creation, completion, pickup, status changes, removal.
//! - [`delegation`] -- shared-key issue, redemption, revocation, listing.
//! - [`payments`] -- payment initiation and outcome callbacks.

pub mod delegation;
pub mod ledger;
pub mod payments;

use smartbox_core::error::CoreError;
use smartbox_core::types::DbId;

fn rent_not_found(id: DbId) -> CoreError {
    CoreError::NotFound { entity: "Rent", id }
}
