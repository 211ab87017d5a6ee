//! Route definitions for `/payments`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::payments;
use crate::state::AppState;

/// Routes mounted at `/payments`.
///
/// ```text
/// POST /rents/{rent_id}/pay   -> pay
/// POST /callback              -> callback
/// GET  /{id}                  -> get_by_id
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rents/{rent_id}/pay", post(payments::pay))
        .route("/callback", post(payments::callback))
        .route("/{id}", get(payments::get_by_id))
}
