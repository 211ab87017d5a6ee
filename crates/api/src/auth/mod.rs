//! Caller identity.
//!
//! - [`jwt`] -- access-token validation (and generation, for provisioning
//!   and tests; there is no login flow in this service).

pub mod jwt;
