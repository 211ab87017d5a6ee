//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`payment_secret::PaymentCallbackAuth`] -- Authenticates the payment collaborator.

pub mod auth;
pub mod payment_secret;
pub mod rbac;
