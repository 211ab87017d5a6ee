//! SmartBox rental domain logic.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! repository layer, the HTTP server, and background tasks alike. Nothing
//! in here touches the database or the network.

pub mod actuator;
pub mod delegation;
pub mod error;
pub mod payment;
pub mod pricing;
pub mod rental;
pub mod roles;
pub mod status;
pub mod types;
