//! Handlers for `/shared-keys`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use smartbox_core::types::DbId;
use smartbox_db::models::shared_key::CreateSharedKey;

use crate::engine::delegation;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

/// POST /api/v1/shared-keys
pub async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateSharedKey>,
) -> AppResult<impl IntoResponse> {
    let key = delegation::create_shared_key(
        &state.pool,
        &user,
        input.rent_id,
        &input.receiver_phone,
        input.expires_in_minutes,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(key))))
}

/// GET /api/v1/shared-keys/mine
///
/// Keys addressed to the caller's phone that can still be redeemed.
pub async fn list_mine(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let keys = delegation::list_by_receiver(&state.pool, &user.phone, Utc::now()).await?;
    Ok(Json(DataResponse::new(keys)))
}

/// PUT /api/v1/shared-keys/{id}/open
pub async fn open(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let key =
        delegation::redeem_shared_key(&state.pool, state.actuator.as_ref(), &user, id, Utc::now())
            .await?;
    Ok(Json(DataResponse::new(key)))
}

/// DELETE /api/v1/shared-keys/{id}
pub async fn revoke(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    delegation::revoke_shared_key(&state.pool, &user, id).await?;
    Ok(Json(MessageResponse::new(format!("Shared key {id} revoked"))))
}
