//! Authentication for the payment collaborator's callbacks.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use smartbox_core::error::CoreError;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the shared callback secret.
pub const PAYMENT_SECRET_HEADER: &str = "x-payment-secret";

/// Proves the request came from the payment collaborator by matching the
/// `x-payment-secret` header against `PAYMENT_CALLBACK_SECRET`.
pub struct PaymentCallbackAuth;

impl FromRequestParts<AppState> for PaymentCallbackAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(PAYMENT_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Missing {PAYMENT_SECRET_HEADER} header"
                )))
            })?;

        if !secrets_match(presented, &state.config.payment_callback_secret) {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid payment callback secret".into(),
            )));
        }
        Ok(PaymentCallbackAuth)
    }
}

/// Constant-time for equal lengths; the secret's length is not hidden.
fn secrets_match(presented: &str, expected: &str) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
