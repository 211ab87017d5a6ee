//! Access delegation registry: issue, redeem, revoke and list shared keys.

use smartbox_core::actuator::{CompartmentActuator, OpenReason};
use smartbox_core::delegation::{self, KeyState};
use smartbox_core::error::CoreError;
use smartbox_core::rental;
use smartbox_core::status::{self, RentStatus};
use smartbox_core::types::{DbId, Timestamp};
use smartbox_db::models::shared_key::{NewSharedKey, SharedKey, SharedKeyView};
use smartbox_db::repositories::{RentRepo, SharedKeyRepo, UserRepo};
use sqlx::PgPool;

use super::rent_not_found;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;

fn key_not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "SharedKey",
        id,
    }
}

/// Issue a one-time key letting `receiver_phone` open the compartment of
/// `rent_id` within `expires_in_minutes`.
///
/// The rent is share-locked for the duration, so it cannot be completed or
/// canceled between the checks and the insert.
pub async fn create_shared_key(
    pool: &PgPool,
    sender: &AuthUser,
    rent_id: DbId,
    receiver_phone: &str,
    expires_in_minutes: i64,
    now: Timestamp,
) -> AppResult<SharedKey> {
    delegation::validate_expires_in(expires_in_minutes)?;
    let receiver_phone = delegation::normalize_phone(receiver_phone)?;

    let mut tx = pool.begin().await?;
    let rent = RentRepo::share_lock_by_id(&mut tx, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;
    if !rent.is_owned_by(sender.user_id) {
        return Err(CoreError::Forbidden("Only the rent's owner can share it".into()).into());
    }

    UserRepo::find_by_phone(&mut tx, &receiver_phone)
        .await?
        .ok_or_else(|| CoreError::UnknownPhone(receiver_phone.clone()))?;

    rental::ensure_active(&rent.facts()?)?;
    let expires_at = delegation::bounded_expiry(now, expires_in_minutes, rent.end_time)?;

    let key = SharedKeyRepo::insert(
        &mut tx,
        &NewSharedKey {
            rent_id,
            sender_id: sender.user_id,
            receiver_phone,
            shared_at: now,
            expires_at,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        shared_id = key.id,
        rent_id,
        sender_id = sender.user_id,
        %expires_at,
        "Shared key issued"
    );
    Ok(key)
}

/// Redeem a key as `receiver`: consume it and open the compartment.
///
/// Consumption is a single compare-and-set. The open signal is sent before
/// commit; if the actuator fails, the key stays redeemable.
pub async fn redeem_shared_key(
    pool: &PgPool,
    actuator: &dyn CompartmentActuator,
    receiver: &AuthUser,
    shared_id: DbId,
    now: Timestamp,
) -> AppResult<SharedKey> {
    let mut tx = pool.begin().await?;

    let Some(redeemed) = SharedKeyRepo::redeem(&mut tx, shared_id, &receiver.phone, now).await?
    else {
        let diagnosis = SharedKeyRepo::find_with_rent(&mut tx, shared_id).await?;
        let err = match diagnosis {
            Some(found) if found.key.receiver_phone == receiver.phone => {
                match found.key.state(now) {
                    KeyState::Used { .. } => {
                        CoreError::AlreadyUsed(format!("Shared key {shared_id} was already used"))
                    }
                    KeyState::Expired { expired_at } => CoreError::Expired(format!(
                        "Shared key {shared_id} expired at {expired_at}"
                    )),
                    KeyState::Unused { .. } => {
                        let rent_status = status::rent_status(found.rent_status_id)?;
                        if rent_status != RentStatus::Active {
                            CoreError::InvalidState(format!(
                                "Rent {} is {}; its keys can no longer be used",
                                found.key.rent_id,
                                rent_status.name()
                            ))
                        } else {
                            CoreError::Conflict(format!(
                                "Shared key {shared_id} changed concurrently; retry"
                            ))
                        }
                    }
                }
            }
            // Keys addressed to someone else are indistinguishable from
            // missing ones.
            _ => key_not_found(shared_id),
        };
        return Err(err.into());
    };

    actuator
        .open(
            redeemed.compartment_id,
            OpenReason::SharedKey {
                rent_id: redeemed.key.rent_id,
                shared_id,
            },
        )
        .await?;
    tx.commit().await?;

    tracing::info!(
        shared_id,
        rent_id = redeemed.key.rent_id,
        compartment_id = redeemed.compartment_id,
        "Shared key redeemed"
    );
    Ok(redeemed.key)
}

/// Revoke an unused key. Only the owner of the key's rent may do this.
pub async fn revoke_shared_key(
    pool: &PgPool,
    requester: &AuthUser,
    shared_id: DbId,
) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let found = SharedKeyRepo::lock_with_rent(&mut tx, shared_id)
        .await?
        .ok_or_else(|| key_not_found(shared_id))?;

    if found.rent_user_id != requester.user_id {
        return Err(CoreError::Forbidden("Only the rent's owner can revoke its keys".into()).into());
    }
    if found.key.used_at.is_some() {
        return Err(
            CoreError::AlreadyUsed(format!("Shared key {shared_id} was already used")).into(),
        );
    }

    SharedKeyRepo::delete(&mut tx, shared_id).await?;
    tx.commit().await?;

    tracing::info!(shared_id, rent_id = found.key.rent_id, "Shared key revoked");
    Ok(())
}

/// Every key issued for a rent, newest first. Owner only.
pub async fn list_by_rent(
    pool: &PgPool,
    requester: &AuthUser,
    rent_id: DbId,
    now: Timestamp,
) -> AppResult<Vec<SharedKeyView>> {
    let rent = RentRepo::find_by_id(pool, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;
    if !rent.is_owned_by(requester.user_id) {
        return Err(CoreError::Forbidden("Only the rent's owner can list its keys".into()).into());
    }

    let keys = SharedKeyRepo::list_by_rent(pool, rent_id).await?;
    Ok(keys.into_iter().map(|k| SharedKeyView::at(k, now)).collect())
}

/// Keys the receiver can still redeem, newest first.
pub async fn list_by_receiver(
    pool: &PgPool,
    receiver_phone: &str,
    now: Timestamp,
) -> AppResult<Vec<SharedKeyView>> {
    let keys = SharedKeyRepo::list_unused_by_receiver(pool, receiver_phone, now).await?;
    Ok(keys.into_iter().map(|k| SharedKeyView::at(k, now)).collect())
}
