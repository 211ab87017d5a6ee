//! Request handlers.
//!
//! Handlers extract the caller, path and body, stamp the request time, and
//! delegate to [`crate::engine`]. Mutations go through the engine so they
//! run in one transaction; plain reads may call repositories directly.

pub mod payments;
pub mod rents;
pub mod shared_keys;
