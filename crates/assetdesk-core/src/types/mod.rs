//! # Core Type Definitions
//!
//! This module contains the types shared by every rule module:
//! - Record identifiers (`AssetId`, `AllocationId`, `RoomId`, ...)
//! - The explicit action context (`ActionContext`)
//! - Error types (`DeskError`, `GuardFailure`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers are plain integers implementing `Ord`, so every collection
//! keyed by them iterates in a stable order. Time is never read from the clock
//! inside the rules; it always arrives through `ActionContext`.

use crate::primitives::{MAX_NAME_LENGTH, MAX_TEXT_LENGTH};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// RECORD IDENTIFIERS
// =============================================================================

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// A physical asset in the register.
    AssetId
);
record_id!(
    /// An internal employee.
    EmployeeId
);
record_id!(
    /// A project that can hold equipment.
    ProjectId
);
record_id!(
    /// A camp room.
    RoomId
);
record_id!(
    /// A room type carrying the expected asset template.
    RoomTypeId
);
record_id!(
    /// An external guest staying in a camp room.
    GuestId
);
record_id!(
    /// The company an external guest belongs to.
    PartnerId
);
record_id!(
    /// The user performing an action.
    UserId
);
record_id!(
    /// An allocation of any kind.
    AllocationId
);
record_id!(
    /// A check-in or check-out checklist.
    ChecklistId
);
record_id!(
    /// A fleet vehicle.
    VehicleId
);
record_id!(
    /// Any auxiliary record (fleet logs, follow-ups, tickets, clearances).
    RecordId
);

// =============================================================================
// ACTION CONTEXT
// =============================================================================

/// Who is acting, and when.
///
/// Every transition receives its context explicitly; nothing reads a global
/// "current user" or the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    pub actor: UserId,
    pub now: DateTime<Utc>,
}

impl ActionContext {
    #[must_use]
    pub const fn new(actor: UserId, now: DateTime<Utc>) -> Self {
        Self { actor, now }
    }

    /// Calendar date of the action (UTC).
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// A blocking allocation guard.
///
/// Each variant names exactly one guard so callers can tell which condition
/// stopped the transition. The display text is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardFailure {
    #[error("Add the assets before allocating them.")]
    EmptyLines,

    #[error("Asset {asset} does not exist.")]
    UnknownAsset { asset: AssetId },

    #[error("Asset {name} is not validated. Only validated assets can be allocated.")]
    NotValidated { name: String },

    #[error("Asset {name} is already allocated to {holder}.")]
    AlreadyBound { name: String, holder: String },

    #[error("Room {room} is not ready for assignment.")]
    RoomNotReady { room: String },

    #[error(
        "This room is currently assigned to external guests. You cannot mix internal employees and external guests in the same room."
    )]
    RoomHoldsGuests,

    #[error(
        "This room is currently assigned to internal employees. You cannot mix internal employees and external guests in the same room."
    )]
    RoomHoldsEmployees,

    #[error("{occupant} is already checked in to Room {room}.")]
    AlreadyCheckedIn { occupant: String, room: String },

    #[error("Room {room} is currently full. Please choose another room.")]
    RoomFull { room: String },

    #[error("Please check and verify the Check-In Checklist.")]
    CheckInMissing,

    #[error("Please verify the Check-In Checklist. Only verified checklist assets can be allocated.")]
    CheckInPending,

    #[error("Allocation assets and checklist assets are not matching.")]
    ChecklistMismatch,

    #[error("Please check and verify the Check-Out Checklist.")]
    CheckOutMissing,

    #[error("Please verify the Check-Out Checklist. Only verified checklist assets can be returned.")]
    CheckOutPending,
}

/// Errors that can occur in assetdesk.
///
/// - No silent failures
/// - A failed transition leaves every record untouched
/// - The rules never panic; all errors are recoverable
#[derive(Debug, Error)]
pub enum DeskError {
    /// An allocation guard blocked the transition.
    #[error(transparent)]
    Guard(#[from] GuardFailure),

    /// Input failed a business validation rule.
    #[error("{0}")]
    Validation(String),

    /// The record is not in a state that permits the action.
    #[error("Cannot {action} a record in state '{state}'")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// The referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// A scheduling conflict; the message lists every conflicting record.
    #[error("{0}")]
    Conflict(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl DeskError {
    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    /// True for failures caused by the request rather than by storage.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Self::SerializationError(_) | Self::DeserializationError(_) | Self::IoError(_)
        )
    }
}

// =============================================================================
// INPUT VALIDATION
// =============================================================================

/// Validate a required short name, returning it trimmed.
pub fn require_name(field: &str, value: &str) -> Result<String, DeskError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DeskError::Validation(format!("{} is Required.", field)));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(DeskError::Validation(format!(
            "{} exceeds {} bytes",
            field, MAX_NAME_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate optional free text against the text length limit.
pub fn check_text(field: &str, value: &str) -> Result<(), DeskError> {
    if value.len() > MAX_TEXT_LENGTH {
        return Err(DeskError::Validation(format!(
            "{} exceeds {} bytes",
            field, MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_messages_are_user_facing() {
        let err = DeskError::from(GuardFailure::CheckInMissing);
        assert_eq!(
            err.to_string(),
            "Please check and verify the Check-In Checklist."
        );
        assert!(err.is_user_facing());
    }

    #[test]
    fn storage_errors_are_internal() {
        assert!(!DeskError::IoError("disk".into()).is_user_facing());
    }

    #[test]
    fn require_name_trims_and_rejects_blank() {
        assert_eq!(require_name("Name", "  Laptop ").expect("valid"), "Laptop");
        let err = require_name("Name", "   ").expect_err("blank");
        assert_eq!(err.to_string(), "Name is Required.");
    }

    #[test]
    fn ids_display_as_numbers() {
        assert_eq!(AssetId(42).to_string(), "42");
        assert!(AllocationId(1) < AllocationId(2));
    }
}
