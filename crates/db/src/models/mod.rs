//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` request DTOs for the operations that write it
//! - Plain insert structs built by the engine after validation

pub mod compartment;
pub mod payment;
pub mod rent;
pub mod shared_key;
pub mod user;
