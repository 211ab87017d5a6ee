use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// An identity lookup by phone number found nobody.
    #[error("No user registered with phone number {0}")]
    UnknownPhone(String),

    /// Malformed or out-of-range input (maps to `InvalidArgument`).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The compartment cannot be rented right now.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The entity exists but its current state forbids the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A one-time capability has already been consumed.
    #[error("Already used: {0}")]
    AlreadyUsed(String),

    /// A time-bounded capability is past its deadline.
    #[error("Expired: {0}")]
    Expired(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An external collaborator (e.g. the compartment actuator) failed.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
