//! Route definitions for `/shared-keys`.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::shared_keys;
use crate::state::AppState;

/// Routes mounted at `/shared-keys`.
///
/// ```text
/// POST   /            -> create
/// GET    /mine        -> list_mine
/// DELETE /{id}        -> revoke
/// PUT    /{id}/open   -> open
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(shared_keys::create))
        .route("/mine", get(shared_keys::list_mine))
        .route("/{id}", delete(shared_keys::revoke))
        .route("/{id}/open", put(shared_keys::open))
}
