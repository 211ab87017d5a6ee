//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods. Reads
//! accept `&PgPool`; methods that lock or mutate rows as part of a larger
//! operation accept `&mut Transaction<'_, Postgres>` so the caller decides
//! where the transaction begins and commits.

pub mod compartment_repo;
pub mod payment_repo;
pub mod rent_repo;
pub mod shared_key_repo;
pub mod user_repo;

pub use compartment_repo::CompartmentRepo;
pub use payment_repo::PaymentRepo;
pub use rent_repo::RentRepo;
pub use shared_key_repo::SharedKeyRepo;
pub use user_repo::UserRepo;
