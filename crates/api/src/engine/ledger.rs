//! Rent ledger: the authoritative rent record and its state machine.
//!
//! Rent creation locks the compartment row (`FOR UPDATE`) before checking
//! availability, so concurrent creations for one compartment serialize and
//! at most one of them finds it available. The partial unique index
//! `uq_rents_active_compartment` rejects anything that slips past.

use serde::Serialize;
use smartbox_core::actuator::{CompartmentActuator, OpenReason};
use smartbox_core::delegation::normalize_phone;
use smartbox_core::error::CoreError;
use smartbox_core::payment::PaymentStatus;
use smartbox_core::rental::{self, RentalPlan, RentalType};
use smartbox_core::status::{CompartmentStatus, RentStatus, StatusId};
use smartbox_core::types::{DbId, Money, Timestamp};
use smartbox_db::models::payment::{NewPayment, Payment, ReceiverPayment};
use smartbox_db::models::rent::{CreateRent, NewRent, Rent};
use smartbox_db::repositories::{CompartmentRepo, PaymentRepo, RentRepo, UserRepo};
use sqlx::{PgPool, Postgres, Transaction};

use super::rent_not_found;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;

/// Result of ending an open-ended rent at pickup.
#[derive(Debug, Serialize)]
pub struct PickupReceipt {
    pub rent: Rent,
    pub hours_used: i64,
}

/// Result of a delivery receiver paying and collecting.
#[derive(Debug, Serialize)]
pub struct ReceiverPaymentReceipt {
    pub rent: Rent,
    pub payment: Payment,
    pub hours_used: i64,
}

/// Create a rent for `user_id`.
///
/// `rental_hours` makes it long-term and pre-priced; without it the rent is
/// open-ended. `rental_type = delivery` is routed to
/// [`create_delivery_rent`] and needs `receiver_phone`.
pub async fn create_rent(
    pool: &PgPool,
    user_id: DbId,
    input: &CreateRent,
    now: Timestamp,
) -> AppResult<Rent> {
    if input.rental_type == Some(RentalType::Delivery) {
        if input.rental_hours.is_some() {
            return Err(CoreError::Validation(
                "rental_hours is only valid for long_term rents, not delivery".into(),
            )
            .into());
        }
        let phone = input.receiver_phone.as_deref().ok_or_else(|| {
            CoreError::Validation("delivery rents require a receiver_phone".into())
        })?;
        return create_delivery_rent(pool, user_id, input.compartment_id, phone, now).await;
    }
    if let Some(hours) = input.rental_hours {
        rental::validate_rental_hours(hours)?;
    }

    let mut tx = pool.begin().await?;
    let price_per_hour = lock_available_compartment(&mut tx, input.compartment_id).await?;
    let plan = rental::plan_rental(now, price_per_hour, input.rental_hours, input.rental_type)?;
    let rent = open_rent(&mut tx, user_id, input.compartment_id, price_per_hour, plan, None, now)
        .await?;
    tx.commit().await?;

    tracing::info!(
        rent_id = rent.id,
        user_id,
        compartment_id = rent.compartment_id,
        rental_type = %rent.rental_type,
        price_per_hour = %rent.price_per_hour,
        "Rent created"
    );
    Ok(rent)
}

/// Create a delivery rent: `sender_id` drops something off for the person
/// registered under `receiver_phone`, who pays when collecting.
pub async fn create_delivery_rent(
    pool: &PgPool,
    sender_id: DbId,
    compartment_id: DbId,
    receiver_phone: &str,
    now: Timestamp,
) -> AppResult<Rent> {
    let receiver_phone = normalize_phone(receiver_phone)?;

    let mut tx = pool.begin().await?;
    UserRepo::find_by_phone(&mut tx, &receiver_phone)
        .await?
        .ok_or_else(|| CoreError::UnknownPhone(receiver_phone.clone()))?;

    let price_per_hour = lock_available_compartment(&mut tx, compartment_id).await?;
    let rent = open_rent(
        &mut tx,
        sender_id,
        compartment_id,
        price_per_hour,
        rental::plan_delivery(),
        Some(receiver_phone),
        now,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        rent_id = rent.id,
        sender_id,
        compartment_id,
        "Delivery rent created"
    );
    Ok(rent)
}

/// Lock the compartment, require it to be available, and return the hourly
/// price to snapshot.
async fn lock_available_compartment(
    tx: &mut Transaction<'_, Postgres>,
    compartment_id: DbId,
) -> AppResult<Money> {
    let compartment = CompartmentRepo::lock_with_pricing(tx, compartment_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Compartment",
            id: compartment_id,
        })?;

    let status = compartment.status()?;
    if status != CompartmentStatus::Available {
        return Err(CoreError::ResourceUnavailable(format!(
            "Compartment {compartment_id} is not available ({status:?})"
        ))
        .into());
    }
    Ok(compartment.price_per_hour())
}

async fn open_rent(
    tx: &mut Transaction<'_, Postgres>,
    user_id: DbId,
    compartment_id: DbId,
    price_per_hour: Money,
    plan: RentalPlan,
    receiver_phone: Option<String>,
    now: Timestamp,
) -> AppResult<Rent> {
    let rent = RentRepo::insert(
        tx,
        &NewRent {
            user_id,
            compartment_id,
            start_time: now,
            end_time: plan.end_time,
            price_per_hour,
            total_cost: plan.total_cost,
            rental_type: plan.rental_type,
            receiver_phone,
        },
    )
    .await?;
    CompartmentRepo::occupy(tx, compartment_id).await?;
    Ok(rent)
}

/// End an open-ended rent at pickup: bill elapsed hours at the snapshot
/// price, complete it, and free the compartment.
pub async fn end_short_term_rent(
    pool: &PgPool,
    caller: &AuthUser,
    rent_id: DbId,
    now: Timestamp,
) -> AppResult<PickupReceipt> {
    let mut tx = pool.begin().await?;
    let rent = RentRepo::lock_by_id(&mut tx, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;
    caller.ensure_owner_or_admin(rent.user_id, "rent")?;

    let facts = rent.facts()?;
    rental::ensure_short_term_endable(&facts)?;
    let settlement = rental::settle_open_ended(&facts, now);

    let rent = RentRepo::close(
        &mut tx,
        rent_id,
        RentStatus::Completed,
        settlement.ended_at,
        Some(settlement.ended_at),
        settlement.total_cost,
    )
    .await?;
    CompartmentRepo::release(&mut tx, rent.compartment_id).await?;
    tx.commit().await?;

    tracing::info!(
        rent_id,
        hours_used = settlement.hours_used,
        total_cost = %settlement.total_cost,
        "Short-term rent completed at pickup"
    );
    Ok(PickupReceipt {
        rent,
        hours_used: settlement.hours_used,
    })
}

/// Record that the renter opened their long-term compartment.
///
/// The open signal is sent before commit; if the actuator fails, the
/// pickup time is not recorded.
pub async fn record_locker_open(
    pool: &PgPool,
    actuator: &dyn CompartmentActuator,
    caller: &AuthUser,
    rent_id: DbId,
    now: Timestamp,
) -> AppResult<Rent> {
    let mut tx = pool.begin().await?;
    let rent = RentRepo::lock_by_id(&mut tx, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;
    caller.ensure_owner_or_admin(rent.user_id, "rent")?;
    rental::ensure_locker_openable(&rent.facts()?)?;

    let rent = RentRepo::record_pickup(&mut tx, rent_id, now).await?;
    actuator
        .open(rent.compartment_id, OpenReason::OwnerAccess { rent_id })
        .await?;
    tx.commit().await?;

    tracing::info!(rent_id, compartment_id = rent.compartment_id, "Locker opened by owner");
    Ok(rent)
}

/// Administrative status change. Only `Active -> Completed` and
/// `Active -> Canceled` are accepted; both free the compartment.
pub async fn update_status(
    pool: &PgPool,
    rent_id: DbId,
    status_id: StatusId,
    now: Timestamp,
) -> AppResult<Rent> {
    let to = RentStatus::from_id(status_id)
        .ok_or_else(|| CoreError::Validation(format!("Unknown rent status {status_id}")))?;

    let mut tx = pool.begin().await?;
    let rent = RentRepo::lock_by_id(&mut tx, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;
    let closure = rental::close_for_transition(&rent.facts()?, to, now)?;

    let rent = RentRepo::close(&mut tx, rent_id, to, closure.end_time, None, closure.total_cost)
        .await?;
    CompartmentRepo::release(&mut tx, rent.compartment_id).await?;
    tx.commit().await?;

    tracing::info!(
        rent_id,
        status = to.name(),
        total_cost = %closure.total_cost,
        "Rent status updated"
    );
    Ok(rent)
}

/// The delivery receiver pays and collects: bill elapsed hours, complete the
/// rent, free the compartment, record a paid payment, and open the door.
pub async fn process_receiver_payment(
    pool: &PgPool,
    actuator: &dyn CompartmentActuator,
    caller: &AuthUser,
    rent_id: DbId,
    input: &ReceiverPayment,
    now: Timestamp,
) -> AppResult<ReceiverPaymentReceipt> {
    let mut tx = pool.begin().await?;
    let rent = RentRepo::lock_pending_delivery(&mut tx, rent_id, &caller.phone)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;

    let settlement = rental::settle_open_ended(&rent.facts()?, now);
    let rent = RentRepo::close(
        &mut tx,
        rent_id,
        RentStatus::Completed,
        settlement.ended_at,
        Some(settlement.ended_at),
        settlement.total_cost,
    )
    .await?;
    CompartmentRepo::release(&mut tx, rent.compartment_id).await?;

    let payment = PaymentRepo::insert(
        &mut tx,
        &NewPayment {
            rent_id,
            amount: settlement.total_cost,
            method: input.method,
            status: PaymentStatus::Paid,
            transaction_id: input.transaction_id.clone(),
        },
    )
    .await?;

    actuator
        .open(rent.compartment_id, OpenReason::DeliveryPickup { rent_id })
        .await?;
    tx.commit().await?;

    tracing::info!(
        rent_id,
        payment_id = payment.id,
        total_cost = %settlement.total_cost,
        "Delivery collected and paid by receiver"
    );
    Ok(ReceiverPaymentReceipt {
        rent,
        payment,
        hours_used: settlement.hours_used,
    })
}

/// Administrative removal. Keys and payments cascade; an active rent frees
/// its compartment in the same transaction.
pub async fn remove_rent(pool: &PgPool, rent_id: DbId) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let rent = RentRepo::lock_by_id(&mut tx, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;

    if rent.status()? == RentStatus::Active {
        CompartmentRepo::release(&mut tx, rent.compartment_id).await?;
    }
    RentRepo::delete(&mut tx, rent_id).await?;
    tx.commit().await?;

    tracing::info!(rent_id, compartment_id = rent.compartment_id, "Rent removed");
    Ok(())
}

/// Load a rent the caller may see: its owner, an admin, or the receiver of
/// a delivery.
pub async fn get_rent(pool: &PgPool, caller: &AuthUser, rent_id: DbId) -> AppResult<Rent> {
    let rent = RentRepo::find_by_id(pool, rent_id)
        .await?
        .ok_or_else(|| rent_not_found(rent_id))?;

    let is_receiver = rent.receiver_phone.as_deref() == Some(caller.phone.as_str());
    if !is_receiver {
        caller.ensure_owner_or_admin(rent.user_id, "rent")?;
    }
    Ok(rent)
}
