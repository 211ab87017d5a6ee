pub mod health;
pub mod payments;
pub mod rents;
pub mod shared_keys;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /rents                                  create, list all (admin)
/// /rents/mine                             caller's rents
/// /rents/deliveries                       deliveries awaiting the caller
/// /rents/delivery                         create delivery rent (POST)
/// /rents/{id}                             get, remove (admin)
/// /rents/{id}/status                      update status (admin, PUT)
/// /rents/{id}/pickup                      end open-ended rent (PUT)
/// /rents/{id}/open                        open long-term compartment (PUT)
/// /rents/{id}/share                       issue shared key (POST)
/// /rents/{id}/shared-keys                 keys issued for the rent
/// /rents/{id}/receiver-payment            receiver pays and collects (POST)
/// /rents/{id}/payments                    payment attempts for the rent
///
/// /shared-keys                            issue shared key (POST)
/// /shared-keys/mine                       keys the caller can redeem
/// /shared-keys/{id}                       revoke (DELETE)
/// /shared-keys/{id}/open                  redeem (PUT)
///
/// /payments/rents/{rent_id}/pay           initiate payment (POST)
/// /payments/callback                      payment outcome (POST, secret header)
/// /payments/{id}                          get payment
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Rent ledger, plus the rent-scoped keys and payments.
        .nest("/rents", rents::router())
        // Access delegation.
        .nest("/shared-keys", shared_keys::router())
        // Payment initiation and collaborator callbacks.
        .nest("/payments", payments::router())
}
