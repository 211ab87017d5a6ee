//! Payment reconciler: opens payment attempts for a rent and applies the
//! outcomes the payment collaborator reports.
//!
//! A rent may accumulate failed attempts but is paid at most once
//! (`uq_payments_paid_rent`). A failed payment leaves the rent and its
//! compartment exactly as they were.

use smartbox_core::error::CoreError;
use smartbox_core::payment::{self, PaymentStatus};
use smartbox_core::types::{DbId, Timestamp};
use smartbox_db::models::payment::{CreatePayment, NewPayment, Payment, PaymentCallback};
use smartbox_db::repositories::{PaymentRepo, RentRepo};
use sqlx::PgPool;

use super::rent_not_found;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;

/// Open a pending payment for the amount the rent owes.
pub async fn initiate_payment(
    pool: &PgPool,
    caller: &AuthUser,
    rent_id: DbId,
    input: &CreatePayment,
) -> AppResult<Payment> {
    let mut tx = pool.begin().await?;
    let rent = RentRepo::lock_by_id(&mut tx, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;
    caller.ensure_owner_or_admin(rent.user_id, "rent")?;

    if PaymentRepo::has_paid(&mut tx, rent_id).await? {
        return Err(CoreError::Conflict(format!("Rent {rent_id} is already paid")).into());
    }
    let amount = payment::ensure_payable(&rent.facts()?, rent.pickup_time, input.amount)?;

    let payment = PaymentRepo::insert(
        &mut tx,
        &NewPayment {
            rent_id,
            amount,
            method: input.method,
            status: PaymentStatus::Pending,
            transaction_id: None,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        payment_id = payment.id,
        rent_id,
        %amount,
        method = %input.method,
        "Payment initiated"
    );
    Ok(payment)
}

/// Apply a reported outcome to the rent's latest pending payment.
///
/// Replaying a callback whose transaction id was already applied to this
/// rent with the same outcome returns the recorded payment unchanged.
pub async fn record_outcome(
    pool: &PgPool,
    callback: &PaymentCallback,
    now: Timestamp,
) -> AppResult<Payment> {
    let outcome = callback.status.resulting_status();
    if callback.transaction_id.trim().is_empty() {
        return Err(CoreError::Validation("transaction_id must not be empty".into()).into());
    }

    let mut tx = pool.begin().await?;
    // Serialize callbacks for the same rent.
    RentRepo::lock_by_id(&mut tx, callback.rent_id)
        .await?
        .ok_or_else(|| rent_not_found(callback.rent_id))?;

    if let Some(existing) =
        PaymentRepo::find_by_transaction_id(&mut tx, &callback.transaction_id).await?
    {
        if existing.rent_id == callback.rent_id && existing.status()? == outcome {
            tracing::debug!(
                payment_id = existing.id,
                transaction_id = %callback.transaction_id,
                "Payment callback replayed"
            );
            return Ok(existing);
        }
        return Err(CoreError::Conflict(format!(
            "Transaction {} is already recorded against payment {}",
            callback.transaction_id, existing.id
        ))
        .into());
    }

    let pending = PaymentRepo::lock_latest_pending(&mut tx, callback.rent_id)
        .await?
        .ok_or_else(|| {
            CoreError::InvalidState(format!(
                "Rent {} has no pending payment",
                callback.rent_id
            ))
        })?;

    if outcome == PaymentStatus::Paid && PaymentRepo::has_paid(&mut tx, callback.rent_id).await? {
        return Err(
            CoreError::Conflict(format!("Rent {} is already paid", callback.rent_id)).into(),
        );
    }

    let payment =
        PaymentRepo::set_outcome(&mut tx, pending.id, outcome, &callback.transaction_id, now)
            .await?;
    tx.commit().await?;

    tracing::info!(
        payment_id = payment.id,
        rent_id = callback.rent_id,
        status = %outcome,
        "Payment outcome recorded"
    );
    Ok(payment)
}

/// Load a payment the caller may see (owner of the rent, or admin).
pub async fn get_payment(pool: &PgPool, caller: &AuthUser, payment_id: DbId) -> AppResult<Payment> {
    let payment = PaymentRepo::find_by_id(pool, payment_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Payment",
            id: payment_id,
        })?;
    let rent = RentRepo::find_by_id(pool, payment.rent_id)
        .await?
        .ok_or_else(|| rent_not_found(payment.rent_id))?;
    caller.ensure_owner_or_admin(rent.user_id, "payment")?;
    Ok(payment)
}

/// Payment attempts for a rent, newest first (owner or admin).
pub async fn list_for_rent(
    pool: &PgPool,
    caller: &AuthUser,
    rent_id: DbId,
) -> AppResult<Vec<Payment>> {
    let rent = RentRepo::find_by_id(pool, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;
    caller.ensure_owner_or_admin(rent.user_id, "rent")?;
    Ok(PaymentRepo::list_by_rent(pool, rent_id).await?)
}
