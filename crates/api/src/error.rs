use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use smartbox_core::error::CoreError;

/// Error type shared by handlers, extractors, the engine and background jobs.
///
/// Renders as `{ "success": false, "code": "...", "message": "..." }`.
/// Internal and unexpected database errors are logged and replaced by a
/// generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(err) if smartbox_db::is_retryable(err))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    code: &'static str,
    message: String,
}

impl ErrorBody {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self::new("INTERNAL_ERROR", "An internal error occurred")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Core(err) => classify_core_error(err),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorBody::new("BAD_REQUEST", msg.as_str()))
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal())
            }
        };
        (status, Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, ErrorBody) {
    let (status, code) = match err {
        CoreError::NotFound { .. } | CoreError::UnknownPhone(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        }
        CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        CoreError::ResourceUnavailable(_) => (StatusCode::CONFLICT, "RESOURCE_UNAVAILABLE"),
        CoreError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
        CoreError::AlreadyUsed(_) => (StatusCode::CONFLICT, "ALREADY_USED"),
        CoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        CoreError::Expired(_) => (StatusCode::FORBIDDEN, "EXPIRED"),
        CoreError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        CoreError::Upstream(msg) => {
            tracing::warn!(error = %msg, "Compartment actuator failed");
            return (
                StatusCode::BAD_GATEWAY,
                ErrorBody::new(
                    "UPSTREAM_ERROR",
                    "The compartment could not be reached; nothing was changed",
                ),
            );
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            return (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal());
        }
    };
    (status, ErrorBody::new(code, message_for(err)))
}

fn message_for(err: &CoreError) -> String {
    match err {
        CoreError::NotFound { entity, id } => format!("{entity} with id {id} not found"),
        CoreError::Validation(msg)
        | CoreError::ResourceUnavailable(msg)
        | CoreError::InvalidState(msg)
        | CoreError::AlreadyUsed(msg)
        | CoreError::Conflict(msg)
        | CoreError::Expired(msg)
        | CoreError::Unauthorized(msg)
        | CoreError::Forbidden(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Map a sqlx error to a response.
///
/// Contention (lock timeout, deadlock, serialization failure, pool
/// exhaustion) is 503 `RETRYABLE`. Violations of the `uq_*` indexes that
/// back engine invariants are reported in domain terms; any other failure
/// is logged and sanitized.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, ErrorBody) {
    if smartbox_db::is_retryable(err) {
        tracing::warn!(error = %err, "Retryable database error");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorBody::new("RETRYABLE", "The resource is busy; retry the request"),
        );
    }

    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            ErrorBody::new("NOT_FOUND", "Resource not found"),
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let body = match db_err.constraint().unwrap_or_default() {
                "uq_rents_active_compartment" => ErrorBody::new(
                    "RESOURCE_UNAVAILABLE",
                    "Compartment is already rented",
                ),
                "uq_payments_paid_rent" => ErrorBody::new("CONFLICT", "Rent is already paid"),
                "uq_payments_transaction_id" => ErrorBody::new(
                    "CONFLICT",
                    "Transaction id was already applied to another payment",
                ),
                constraint if constraint.starts_with("uq_") => ErrorBody::new(
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                ),
                _ => {
                    tracing::error!(error = %db_err, "Unnamed unique violation");
                    return (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal());
                }
            };
            (StatusCode::CONFLICT, body)
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal())
        }
    }
}
