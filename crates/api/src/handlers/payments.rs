//! Handlers for `/payments`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use smartbox_core::types::DbId;
use smartbox_db::models::payment::{CreatePayment, PaymentCallback};

use crate::engine::payments;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::payment_secret::PaymentCallbackAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/payments/rents/{rent_id}/pay
pub async fn pay(
    user: AuthUser,
    State(state): State<AppState>,
    Path(rent_id): Path<DbId>,
    Json(input): Json<CreatePayment>,
) -> AppResult<impl IntoResponse> {
    let payment = payments::initiate_payment(&state.pool, &user, rent_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(payment))))
}

/// POST /api/v1/payments/callback
///
/// Called by the payment collaborator, authenticated by `x-payment-secret`.
pub async fn callback(
    _auth: PaymentCallbackAuth,
    State(state): State<AppState>,
    Json(input): Json<PaymentCallback>,
) -> AppResult<impl IntoResponse> {
    let payment = payments::record_outcome(&state.pool, &input, Utc::now()).await?;
    Ok(Json(DataResponse::new(payment)))
}

/// GET /api/v1/payments/{id}
pub async fn get_by_id(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let payment = payments::get_payment(&state.pool, &user, id).await?;
    Ok(Json(DataResponse::new(payment)))
}
