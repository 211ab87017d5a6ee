//! Route definitions for `/rents`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::rents;
use crate::state::AppState;

/// Routes mounted at `/rents`.
///
/// ```text
/// GET    /                        -> list_all (admin)
/// POST   /                        -> create
/// GET    /mine                    -> list_mine
/// GET    /deliveries              -> list_deliveries
/// POST   /delivery                -> create_delivery
/// GET    /{id}                    -> get_by_id
/// DELETE /{id}                    -> remove (admin)
/// PUT    /{id}/status             -> update_status (admin)
/// PUT    /{id}/pickup             -> pickup
/// PUT    /{id}/open               -> open
/// POST   /{id}/share              -> share
/// GET    /{id}/shared-keys        -> list_shared_keys
/// POST   /{id}/receiver-payment   -> receiver_payment
/// GET    /{id}/payments           -> list_payments
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rents::list_all).post(rents::create))
        .route("/mine", get(rents::list_mine))
        .route("/deliveries", get(rents::list_deliveries))
        .route("/delivery", post(rents::create_delivery))
        .route("/{id}", get(rents::get_by_id).delete(rents::remove))
        .route("/{id}/status", put(rents::update_status))
        .route("/{id}/pickup", put(rents::pickup))
        .route("/{id}/open", put(rents::open))
        .route("/{id}/share", post(rents::share))
        .route("/{id}/shared-keys", get(rents::list_shared_keys))
        .route("/{id}/receiver-payment", post(rents::receiver_payment))
        .route("/{id}/payments", get(rents::list_payments))
}
