//! Time-bounded, one-time access delegation ("shared keys").
//!
//! A shared key lets one receiver open the compartment of one rent, once,
//! before a deadline. Only two timestamps are stored (`expires_at` and
//! `used_at`); the effective state is derived on read by [`KeyState::derive`].

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Shortest lifetime a sender may request.
pub const MIN_EXPIRES_IN_MINUTES: i64 = 5;

/// Longest lifetime a sender may request (24 hours).
pub const MAX_EXPIRES_IN_MINUTES: i64 = 1440;

/// Window granted once a fixed-term rent has passed its end time.
pub const POST_END_GRACE_MINUTES: i64 = 30;

/// Vietnamese mobile numbers, local (`0…`) or international (`84…`,
/// `+84…`) form. Captures the nine-digit subscriber number.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+84|84|0)([35789]\d{8})$").expect("phone regex is valid")
});

/// Effective state of a shared key at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KeyState {
    /// Redeemable until `expires_at`.
    Unused { expires_at: Timestamp },
    /// Consumed at `used_at`; terminal.
    Used { used_at: Timestamp },
    /// Never consumed and now past its deadline; terminal.
    Expired { expired_at: Timestamp },
}

impl KeyState {
    /// Derive the state from the stored timestamps. A consumed key stays
    /// `Used` even after its deadline passes.
    pub fn derive(used_at: Option<Timestamp>, expires_at: Timestamp, now: Timestamp) -> Self {
        match used_at {
            Some(used_at) => KeyState::Used { used_at },
            None if now > expires_at => KeyState::Expired {
                expired_at: expires_at,
            },
            None => KeyState::Unused { expires_at },
        }
    }

    pub fn is_redeemable(&self) -> bool {
        matches!(self, KeyState::Unused { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            KeyState::Unused { .. } => "unused",
            KeyState::Used { .. } => "used",
            KeyState::Expired { .. } => "expired",
        }
    }
}

/// Reject requested lifetimes outside
/// `MIN_EXPIRES_IN_MINUTES..=MAX_EXPIRES_IN_MINUTES`.
pub fn validate_expires_in(minutes: i64) -> Result<(), CoreError> {
    if !(MIN_EXPIRES_IN_MINUTES..=MAX_EXPIRES_IN_MINUTES).contains(&minutes) {
        return Err(CoreError::Validation(format!(
            "expires_in_minutes must be between {MIN_EXPIRES_IN_MINUTES} and \
             {MAX_EXPIRES_IN_MINUTES}, got {minutes}"
        )));
    }
    Ok(())
}

/// Latest deadline a key created at `now` may carry for a rent ending at
/// `rent_end`.
///
/// - open-ended rent: `now + 24h`
/// - rent still running: `min(rent_end, now + 24h)`
/// - rent already past its end: `now + 30min`
pub fn latest_allowed_expiry(now: Timestamp, rent_end: Option<Timestamp>) -> Timestamp {
    let day_cap = now + Duration::minutes(MAX_EXPIRES_IN_MINUTES);
    match rent_end {
        None => day_cap,
        Some(end) if end > now => end.min(day_cap),
        Some(_) => now + Duration::minutes(POST_END_GRACE_MINUTES),
    }
}

/// Compute `expires_at` for a key requested at `now` with a lifetime of
/// `expires_in_minutes`, enforcing the bounding rule.
pub fn bounded_expiry(
    now: Timestamp,
    expires_in_minutes: i64,
    rent_end: Option<Timestamp>,
) -> Result<Timestamp, CoreError> {
    validate_expires_in(expires_in_minutes)?;
    let expires_at = now + Duration::minutes(expires_in_minutes);
    let limit = latest_allowed_expiry(now, rent_end);
    if expires_at > limit {
        let reason = match rent_end {
            Some(end) if end <= now => format!(
                "the rent has already ended; keys may last at most {POST_END_GRACE_MINUTES} minutes"
            ),
            _ => "the key may not outlive the rent's end time".to_string(),
        };
        return Err(CoreError::Validation(format!(
            "Requested expiry {expires_at} exceeds the latest allowed {limit}: {reason}"
        )));
    }
    Ok(expires_at)
}

/// Parse a Vietnamese mobile number into its local `0XXXXXXXXX` form.
///
/// Phones are stored and compared in this form only, so `+84901234567`,
/// `84901234567` and `0901234567` all address the same person.
pub fn normalize_phone(phone: &str) -> Result<String, CoreError> {
    PHONE_RE
        .captures(phone.trim())
        .map(|caps| format!("0{}", &caps[1]))
        .ok_or_else(|| CoreError::Validation(format!("Invalid phone number '{phone}'")))
}
