//! Rental modes and the decisions the rent ledger makes before writing.
//!
//! Every function here is pure: callers load the rent (under a row lock),
//! hand the relevant fields in, and persist whatever comes back.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::pricing;
use crate::status::RentStatus;
use crate::types::{DbId, Money, Timestamp};

/// Longest fixed term accepted at creation (one year).
pub const MAX_RENTAL_HOURS: i32 = 24 * 366;

/// How a rent is billed and closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalType {
    /// Open-ended; billed from elapsed time when the renter picks up.
    ShortTerm,
    /// Fixed term; priced and billed at creation.
    LongTerm,
    /// Open-ended; created by a sender, closed and paid by the receiver.
    Delivery,
}

impl RentalType {
    pub fn as_str(self) -> &'static str {
        match self {
            RentalType::ShortTerm => "short_term",
            RentalType::LongTerm => "long_term",
            RentalType::Delivery => "delivery",
        }
    }
}

impl fmt::Display for RentalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentalType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_term" => Ok(RentalType::ShortTerm),
            "long_term" => Ok(RentalType::LongTerm),
            "delivery" => Ok(RentalType::Delivery),
            other => Err(CoreError::Validation(format!(
                "Unknown rental type '{other}'; expected short_term, long_term or delivery"
            ))),
        }
    }
}

/// What a new rent looks like once its mode has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalPlan {
    pub rental_type: RentalType,
    pub end_time: Option<Timestamp>,
    pub total_cost: Option<Money>,
}

/// Resolve the mode, end time and up-front cost of a rent being created.
///
/// Supplying `rental_hours` makes the rent long-term: it ends at
/// `now + rental_hours` and is priced immediately. Without it the rent is
/// open-ended and priced at completion. An explicit `requested` type must
/// agree with that choice. Delivery rents are planned by
/// [`plan_delivery`] instead.
pub fn plan_rental(
    now: Timestamp,
    price_per_hour: Money,
    rental_hours: Option<i32>,
    requested: Option<RentalType>,
) -> Result<RentalPlan, CoreError> {
    match (rental_hours, requested) {
        (Some(hours), None | Some(RentalType::LongTerm)) => {
            validate_rental_hours(hours)?;
            Ok(RentalPlan {
                rental_type: RentalType::LongTerm,
                end_time: Some(now + Duration::hours(i64::from(hours))),
                total_cost: Some(pricing::cost(i64::from(hours), price_per_hour)),
            })
        }
        (Some(_), Some(other)) => Err(CoreError::Validation(format!(
            "rental_hours is only valid for long_term rents, not {other}"
        ))),
        (None, Some(RentalType::LongTerm)) => Err(CoreError::Validation(
            "long_term rents require rental_hours".into(),
        )),
        (None, Some(RentalType::Delivery)) => Err(CoreError::Validation(
            "delivery rents require a receiver_phone".into(),
        )),
        (None, None | Some(RentalType::ShortTerm)) => Ok(RentalPlan {
            rental_type: RentalType::ShortTerm,
            end_time: None,
            total_cost: None,
        }),
    }
}

/// Delivery rents are open-ended and unpriced until the receiver pays.
pub fn plan_delivery() -> RentalPlan {
    RentalPlan {
        rental_type: RentalType::Delivery,
        end_time: None,
        total_cost: None,
    }
}

/// Reject fixed terms outside `1..=MAX_RENTAL_HOURS`.
pub fn validate_rental_hours(hours: i32) -> Result<(), CoreError> {
    if !(1..=MAX_RENTAL_HOURS).contains(&hours) {
        return Err(CoreError::Validation(format!(
            "rental_hours must be between 1 and {MAX_RENTAL_HOURS}, got {hours}"
        )));
    }
    Ok(())
}

/// Facts about a persisted rent that the guards below inspect.
#[derive(Debug, Clone, Copy)]
pub struct RentFacts {
    pub id: DbId,
    pub status: RentStatus,
    pub rental_type: RentalType,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub price_per_hour: Money,
    pub total_cost: Option<Money>,
}

/// Final figures written when an open-ended rent is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub hours_used: i64,
    pub total_cost: Money,
    pub ended_at: Timestamp,
}

/// Bill an open-ended rent from its start until `now` using its price
/// snapshot.
pub fn settle_open_ended(rent: &RentFacts, now: Timestamp) -> Settlement {
    let (hours_used, total_cost) =
        pricing::elapsed_cost(rent.start_time, now, rent.price_per_hour);
    Settlement {
        hours_used,
        total_cost,
        ended_at: now,
    }
}

/// A renter may end a rent at pickup only while it is Active, open-ended,
/// and not a delivery (deliveries are closed by the receiver's payment).
pub fn ensure_short_term_endable(rent: &RentFacts) -> Result<(), CoreError> {
    ensure_active(rent)?;
    if rent.rental_type == RentalType::Delivery {
        return Err(CoreError::InvalidState(format!(
            "Rent {} is a delivery; it is closed by the receiver's payment",
            rent.id
        )));
    }
    if rent.end_time.is_some() || rent.rental_type == RentalType::LongTerm {
        return Err(CoreError::InvalidState(format!(
            "Rent {} has a fixed term and cannot be ended by pickup",
            rent.id
        )));
    }
    Ok(())
}

/// Recording physical access applies to Active long-term rents only.
pub fn ensure_locker_openable(rent: &RentFacts) -> Result<(), CoreError> {
    ensure_active(rent)?;
    if rent.rental_type != RentalType::LongTerm {
        return Err(CoreError::InvalidState(format!(
            "Rent {} is {}; only long_term rents record locker opens",
            rent.id, rent.rental_type
        )));
    }
    Ok(())
}

pub fn ensure_active(rent: &RentFacts) -> Result<(), CoreError> {
    if rent.status != RentStatus::Active {
        return Err(CoreError::InvalidState(format!(
            "Rent {} is {}, not Active",
            rent.id,
            rent.status.name()
        )));
    }
    Ok(())
}

/// End time and cost written by an administrative status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closure {
    pub end_time: Timestamp,
    pub total_cost: Money,
}

/// Work out how an administrative transition to `to` closes the rent.
///
/// Completing keeps an already-fixed cost (long-term rents); otherwise the
/// rent ends now and is billed for elapsed hours. Canceling keeps any fixed
/// end and cost and otherwise ends now at zero cost.
pub fn close_for_transition(
    rent: &RentFacts,
    to: RentStatus,
    now: Timestamp,
) -> Result<Closure, CoreError> {
    rent.status.validate_transition(to)?;
    let closure = match (to, rent.total_cost) {
        (RentStatus::Completed, Some(fixed)) => Closure {
            end_time: rent.end_time.unwrap_or(now),
            total_cost: fixed,
        },
        (RentStatus::Completed, None) => {
            let settlement = settle_open_ended(rent, now);
            Closure {
                end_time: settlement.ended_at,
                total_cost: settlement.total_cost,
            }
        }
        (_, fixed) => Closure {
            end_time: rent.end_time.unwrap_or(now),
            total_cost: fixed.unwrap_or(Money::ZERO),
        },
    };
    Ok(closure)
}
