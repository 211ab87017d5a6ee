//! Payment status, methods, and the rules for what may be paid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::rental::{RentFacts, RentalType};
use crate::status::RentStatus;
use crate::types::{Money, Timestamp};

/// Lifecycle of a payment row: `pending -> paid | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(CoreError::Internal(format!("Unknown payment status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Momo,
    Zalopay,
    Payos,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Momo => "momo",
            PaymentMethod::Zalopay => "zalopay",
            PaymentMethod::Payos => "payos",
            PaymentMethod::Cash => "cash",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "momo" => Ok(PaymentMethod::Momo),
            "zalopay" => Ok(PaymentMethod::Zalopay),
            "payos" => Ok(PaymentMethod::Payos),
            "cash" => Ok(PaymentMethod::Cash),
            other => Err(CoreError::Validation(format!(
                "Unknown payment method '{other}'; expected card, momo, zalopay, payos or cash"
            ))),
        }
    }
}

/// Outcome reported by the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Success,
    Failure,
}

impl CallbackStatus {
    /// Status the pending payment moves to.
    pub fn resulting_status(self) -> PaymentStatus {
        match self {
            CallbackStatus::Success => PaymentStatus::Paid,
            CallbackStatus::Failure => PaymentStatus::Failed,
        }
    }
}

/// Decide whether `rent` can be paid now and return the amount due.
///
/// Long-term rents are pre-paid while Active and stay payable once completed,
/// with or without a pickup, since their cost was fixed at creation.
/// Open-ended rents are post-paid once completed, which fixes their cost and
/// pickup time.
/// `requested` is the amount the client believes it owes; it must match.
pub fn ensure_payable(
    rent: &RentFacts,
    pickup_time: Option<Timestamp>,
    requested: Option<Money>,
) -> Result<Money, CoreError> {
    let due = match (rent.status, rent.rental_type, rent.total_cost) {
        (RentStatus::Active | RentStatus::Completed, RentalType::LongTerm, Some(cost)) => cost,
        (RentStatus::Completed, _, Some(cost)) if pickup_time.is_some() => cost,
        (RentStatus::Canceled, _, _) => {
            return Err(CoreError::InvalidState(format!(
                "Rent {} was canceled and cannot be paid",
                rent.id
            )))
        }
        _ => {
            return Err(CoreError::InvalidState(format!(
                "Rent {} has no settled cost to pay yet",
                rent.id
            )))
        }
    };

    if let Some(amount) = requested {
        if amount != due {
            return Err(CoreError::Validation(format!(
                "Payment amount {amount} does not match the amount due {due}"
            )));
        }
    }
    Ok(due)
}
