//! Handlers for `/rents`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use smartbox_core::types::DbId;
use smartbox_db::models::payment::ReceiverPayment;
use smartbox_db::models::rent::{CreateDeliveryRent, CreateRent, UpdateRentStatus};
use smartbox_db::models::shared_key::ShareRent;
use smartbox_db::repositories::RentRepo;

use crate::engine::{delegation, ledger, payments};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// POST /api/v1/rents
pub async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateRent>,
) -> AppResult<impl IntoResponse> {
    let rent = ledger::create_rent(&state.pool, user.user_id, &input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(rent))))
}

/// POST /api/v1/rents/delivery
///
/// The caller is the sender; the receiver pays when collecting.
pub async fn create_delivery(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateDeliveryRent>,
) -> AppResult<impl IntoResponse> {
    let rent = ledger::create_delivery_rent(
        &state.pool,
        user.user_id,
        input.compartment_id,
        &input.receiver_phone,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(rent))))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/rents (admin)
pub async fn list_all(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let rents = RentRepo::list_all(&state.pool).await?;
    Ok(Json(DataResponse::new(rents)))
}

/// GET /api/v1/rents/mine
pub async fn list_mine(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let rents = RentRepo::list_by_user(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse::new(rents)))
}

/// GET /api/v1/rents/deliveries
///
/// Deliveries waiting for the caller to collect them.
pub async fn list_deliveries(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let rents = RentRepo::list_pending_deliveries(&state.pool, &user.phone).await?;
    Ok(Json(DataResponse::new(rents)))
}

/// GET /api/v1/rents/{id}
pub async fn get_by_id(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let rent = ledger::get_rent(&state.pool, &user, id).await?;
    Ok(Json(DataResponse::new(rent)))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// PUT /api/v1/rents/{id}/pickup
///
/// End an open-ended rent and bill the elapsed hours.
pub async fn pickup(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let receipt = ledger::end_short_term_rent(&state.pool, &user, id, Utc::now()).await?;
    Ok(Json(DataResponse::new(receipt)))
}

/// PUT /api/v1/rents/{id}/open
pub async fn open(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let rent = ledger::record_locker_open(
        &state.pool,
        state.actuator.as_ref(),
        &user,
        id,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse::new(rent)))
}

/// PUT /api/v1/rents/{id}/status (admin)
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateRentStatus>,
) -> AppResult<impl IntoResponse> {
    let rent = ledger::update_status(&state.pool, id, input.status_id, Utc::now()).await?;
    tracing::info!(rent_id = id, admin_id = admin.user_id, "Rent status changed by admin");
    Ok(Json(DataResponse::new(rent)))
}

/// POST /api/v1/rents/{id}/receiver-payment
///
/// The delivery receiver pays, which completes the rent and opens the door.
pub async fn receiver_payment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ReceiverPayment>,
) -> AppResult<impl IntoResponse> {
    let receipt = ledger::process_receiver_payment(
        &state.pool,
        state.actuator.as_ref(),
        &user,
        id,
        &input,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse::new(receipt)))
}

/// DELETE /api/v1/rents/{id} (admin)
pub async fn remove(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ledger::remove_rent(&state.pool, id).await?;
    tracing::info!(rent_id = id, admin_id = admin.user_id, "Rent removed by admin");
    Ok(Json(MessageResponse::new(format!("Rent {id} removed"))))
}

// ---------------------------------------------------------------------------
// Sub-resources
// ---------------------------------------------------------------------------

/// POST /api/v1/rents/{id}/share
pub async fn share(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ShareRent>,
) -> AppResult<impl IntoResponse> {
    let key = delegation::create_shared_key(
        &state.pool,
        &user,
        id,
        &input.receiver_phone,
        input.expires_in_minutes,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(key))))
}

/// GET /api/v1/rents/{id}/shared-keys
pub async fn list_shared_keys(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let keys = delegation::list_by_rent(&state.pool, &user, id, Utc::now()).await?;
    Ok(Json(DataResponse::new(keys)))
}

/// GET /api/v1/rents/{id}/payments
pub async fn list_payments(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let payments = payments::list_for_rent(&state.pool, &user, id).await?;
    Ok(Json(DataResponse::new(payments)))
}
