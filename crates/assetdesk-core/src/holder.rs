//! # Holders
//!
//! The parties an allocation can bind assets to. Each allocation kind picks
//! one holder type; the workflow in [`crate::allocation`] is generic over it.

use crate::asset::HolderRef;
use crate::{DeskError, EmployeeId, GuestId, PartnerId, ProjectId, RoomId};
use serde::{Deserialize, Serialize};

/// Capability set of an allocation holder.
pub trait Holder: Clone + std::fmt::Debug {
    /// The binding written onto every allocated asset.
    fn holder_ref(&self) -> HolderRef;

    /// Name used in user-facing messages.
    fn label(&self) -> String {
        self.holder_ref().to_string()
    }

    /// Whether an asset already bound to `current` may join this allocation.
    fn shares(&self, current: &HolderRef) -> bool {
        let _ = current;
        false
    }
}

// =============================================================================
// GENERAL EQUIPMENT: EMPLOYEE OR PROJECT
// =============================================================================

/// Holder of general equipment: exactly one employee or one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignee {
    Employee(EmployeeId),
    Project(ProjectId),
}

impl Assignee {
    /// Build from the two optional form fields; exactly one must be set.
    pub fn from_parts(
        employee: Option<EmployeeId>,
        project: Option<ProjectId>,
    ) -> Result<Self, DeskError> {
        match (employee, project) {
            (Some(employee), None) => Ok(Self::Employee(employee)),
            (None, Some(project)) => Ok(Self::Project(project)),
            (None, None) => Err(DeskError::Validation(
                "Either Employee or Project must be selected.".to_string(),
            )),
            (Some(_), Some(_)) => Err(DeskError::Validation(
                "You cannot allocate an asset to both an Employee and a Project at the same time."
                    .to_string(),
            )),
        }
    }
}

impl Holder for Assignee {
    fn holder_ref(&self) -> HolderRef {
        match *self {
            Self::Employee(employee) => HolderRef::Employee {
                employee,
                project: None,
            },
            Self::Project(project) => HolderRef::Project { project },
        }
    }
}

// =============================================================================
// IT AND TOOLS: EMPLOYEE, OPTIONALLY CHARGED TO A PROJECT
// =============================================================================

/// Holder of IT assets and tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Custodian {
    pub employee: EmployeeId,
    pub project: Option<ProjectId>,
}

impl Holder for Custodian {
    fn holder_ref(&self) -> HolderRef {
        HolderRef::Employee {
            employee: self.employee,
            project: self.project,
        }
    }
}

// =============================================================================
// CAMP ROOMS: INTERNAL EMPLOYEE OR EXTERNAL GUEST
// =============================================================================

/// A person staying in a camp room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupant {
    Internal {
        employee: EmployeeId,
    },
    External {
        guest: GuestId,
        partner: Option<PartnerId>,
    },
}

impl Occupant {
    /// Build from the two optional form fields; exactly one must be set.
    pub fn from_parts(
        employee: Option<EmployeeId>,
        guest: Option<GuestId>,
        partner: Option<PartnerId>,
    ) -> Result<Self, DeskError> {
        match (employee, guest) {
            (Some(employee), None) => Ok(Self::Internal { employee }),
            (None, Some(guest)) => Ok(Self::External { guest, partner }),
            (None, None) => Err(DeskError::Validation(
                "You must allocate the asset to either an Employee or a Guest.".to_string(),
            )),
            (Some(_), Some(_)) => Err(DeskError::Validation(
                "You cannot allocate to both an Employee and a Guest at the same time."
                    .to_string(),
            )),
        }
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Two occupants are the same person regardless of the guest's company.
    #[must_use]
    pub fn same_person(&self, other: &Occupant) -> bool {
        match (self, other) {
            (Self::Internal { employee: a }, Self::Internal { employee: b }) => a == b,
            (Self::External { guest: a, .. }, Self::External { guest: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Occupant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal { employee } => write!(f, "Employee {}", employee),
            Self::External { guest, .. } => write!(f, "Guest {}", guest),
        }
    }
}

/// Holder of a camp-room assignment: the room plus the person checking in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOccupancy {
    pub room: RoomId,
    pub occupant: Occupant,
}

impl Holder for RoomOccupancy {
    fn holder_ref(&self) -> HolderRef {
        HolderRef::Room { room: self.room }
    }

    fn label(&self) -> String {
        self.occupant.to_string()
    }

    fn shares(&self, current: &HolderRef) -> bool {
        *current == self.holder_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignee_requires_exactly_one_party() {
        assert_eq!(
            Assignee::from_parts(Some(EmployeeId(1)), None).expect("employee"),
            Assignee::Employee(EmployeeId(1))
        );
        let neither = Assignee::from_parts(None, None).expect_err("neither");
        assert_eq!(
            neither.to_string(),
            "Either Employee or Project must be selected."
        );
        assert!(Assignee::from_parts(Some(EmployeeId(1)), Some(ProjectId(2))).is_err());
    }

    #[test]
    fn occupant_requires_exactly_one_party() {
        let guest = Occupant::from_parts(None, Some(GuestId(4)), Some(PartnerId(9))).expect("guest");
        assert!(!guest.is_internal());
        assert!(Occupant::from_parts(None, None, None).is_err());
        assert!(Occupant::from_parts(Some(EmployeeId(1)), Some(GuestId(1)), None).is_err());
    }

    #[test]
    fn room_occupancy_shares_only_its_own_room() {
        let holder = RoomOccupancy {
            room: RoomId(1),
            occupant: Occupant::Internal {
                employee: EmployeeId(5),
            },
        };
        assert!(holder.shares(&HolderRef::Room { room: RoomId(1) }));
        assert!(!holder.shares(&HolderRef::Room { room: RoomId(2) }));
        assert_eq!(holder.label(), "Employee 5");
    }

    #[test]
    fn same_person_ignores_partner() {
        let a = Occupant::External {
            guest: GuestId(1),
            partner: None,
        };
        let b = Occupant::External {
            guest: GuestId(1),
            partner: Some(PartnerId(2)),
        };
        assert!(a.same_person(&b));
    }
}
