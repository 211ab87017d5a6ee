//! Rental pricing.
//!
//! Prices are fixed-point decimals with two fractional digits, matching the
//! NUMERIC(10,2) columns they are persisted in. The hourly price of a rent is
//! resolved once, at creation, and stored on the rent; every later cost
//! computation starts from that snapshot rather than the live catalog.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{Money, Timestamp};

/// Fractional digits kept for prices and costs.
pub const MONEY_SCALE: u32 = 2;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Resolve the hourly price for a compartment: size base rate times the
/// location multiplier. A missing multiplier counts as 1.
pub fn price_per_hour(base_rate: Money, multiplier: Option<Decimal>) -> Money {
    let multiplier = multiplier.unwrap_or(Decimal::ONE);
    round_money(base_rate * multiplier)
}

/// Whole hours billed for the interval `[start, end]`.
///
/// Any started hour bills as a full hour, down to millisecond precision. An
/// interval that ends before it starts (clock skew) bills zero.
pub fn billable_hours(start: Timestamp, end: Timestamp) -> i64 {
    let elapsed = (end - start).num_milliseconds();
    if elapsed <= 0 {
        return 0;
    }
    (elapsed + MILLIS_PER_HOUR - 1) / MILLIS_PER_HOUR
}

/// Cost of `hours_used` hours at `price_per_hour`.
pub fn cost(hours_used: i64, price_per_hour: Money) -> Money {
    round_money(Decimal::from(hours_used.max(0)) * price_per_hour)
}

/// Cost of an open-ended rental that ran from `start` to `end`.
pub fn elapsed_cost(start: Timestamp, end: Timestamp, price_per_hour: Money) -> (i64, Money) {
    let hours = billable_hours(start, end);
    (hours, cost(hours, price_per_hour))
}

fn round_money(value: Decimal) -> Money {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
