//! Status helper enums mapping to SMALLINT status columns, plus the rent
//! state machine.
//!
//! Discriminants are the values persisted in `rents.status_id` and
//! `compartments.status_id`. They are fixed by existing data, which is why
//! `Active` is 1 and `Completed` is 0.

use crate::error::CoreError;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Rent lifecycle status.
    RentStatus {
        Completed = 0,
        Active = 1,
        Canceled = 2,
    }
}

define_status_enum! {
    /// Compartment occupancy status.
    CompartmentStatus {
        Occupied = 0,
        Available = 1,
        Maintenance = 2,
    }
}

impl RentStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RentStatus::Active)
    }

    /// Returns the set of states reachable from `self`.
    pub fn valid_transitions(self) -> &'static [RentStatus] {
        match self {
            RentStatus::Active => &[RentStatus::Completed, RentStatus::Canceled],
            RentStatus::Completed | RentStatus::Canceled => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition_to(self, to: RentStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning `InvalidState` for illegal ones.
    pub fn validate_transition(self, to: RentStatus) -> Result<(), CoreError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidState(format!(
                "Invalid transition: {} ({}) -> {} ({})",
                self.name(),
                self.id(),
                to.name(),
                to.id()
            )))
        }
    }

    /// Human-readable name (for error messages).
    pub fn name(self) -> &'static str {
        match self {
            RentStatus::Completed => "Completed",
            RentStatus::Active => "Active",
            RentStatus::Canceled => "Canceled",
        }
    }
}

/// Decode a persisted rent status, treating unknown values as corruption.
pub fn rent_status(id: StatusId) -> Result<RentStatus, CoreError> {
    RentStatus::from_id(id).ok_or_else(|| CoreError::Internal(format!("Unknown rent status {id}")))
}
