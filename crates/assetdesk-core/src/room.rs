//! # Camp Rooms
//!
//! Room records, the occupancy computation, room costs and the guards a
//! room assignment plugs into the allocation workflow.

use crate::allocation::{Allocation, AllocationGuard};
use crate::asset::AssetLedger;
use crate::holder::{Occupant, RoomOccupancy};
use crate::{AssetId, DeskError, EmployeeId, GuardFailure, GuestId, RoomId, RoomTypeId, require_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// OCCUPANCY
// =============================================================================

/// Who a room is currently reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyType {
    Internal,
    External,
}

/// Derived occupancy figures. Never stored; always recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub occupied: u32,
    pub vacant: u32,
    pub is_full: bool,
}

impl Occupancy {
    /// Compute occupancy from the room's inputs.
    ///
    /// The occupied count follows the allocation type (internal occupants or
    /// external guests); with no type set it is the larger of the two.
    #[must_use]
    pub fn compute(
        capacity: u32,
        allocation_type: Option<OccupancyType>,
        internal: usize,
        external: usize,
    ) -> Self {
        let internal = u32::try_from(internal).unwrap_or(u32::MAX);
        let external = u32::try_from(external).unwrap_or(u32::MAX);
        let occupied = match allocation_type {
            Some(OccupancyType::Internal) => internal,
            Some(OccupancyType::External) => external,
            None => internal.max(external),
        };
        Self {
            occupied,
            vacant: capacity.saturating_sub(occupied),
            is_full: occupied >= capacity,
        }
    }
}

// =============================================================================
// ROOM
// =============================================================================

/// Readiness of a room for assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    New,
    Done,
}

/// A room type with its extra charge and expected asset template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: RoomTypeId,
    pub name: String,
    pub additional_cost_cents: i64,
    /// Assets a check-in checklist for this type must list exactly.
    pub template: BTreeSet<AssetId>,
}

/// A camp room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub block: Option<String>,
    pub capacity: u32,
    pub room_type: Option<RoomTypeId>,
    pub allocation_type: Option<OccupancyType>,
    pub occupants: BTreeSet<EmployeeId>,
    pub guests: BTreeSet<GuestId>,
    pub assets: BTreeSet<AssetId>,
    pub state: RoomState,
}

impl Room {
    pub fn new(id: RoomId, name: &str, capacity: u32) -> Result<Self, DeskError> {
        if capacity == 0 {
            return Err(DeskError::Validation(
                "Room capacity must be at least 1.".to_string(),
            ));
        }
        Ok(Self {
            id,
            name: require_name("Room name", name)?,
            block: None,
            capacity,
            room_type: None,
            allocation_type: None,
            occupants: BTreeSet::new(),
            guests: BTreeSet::new(),
            assets: BTreeSet::new(),
            state: RoomState::New,
        })
    }

    #[must_use]
    pub fn occupancy(&self) -> Occupancy {
        Occupancy::compute(
            self.capacity,
            self.allocation_type,
            self.occupants.len(),
            self.guests.len(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty() && self.guests.is_empty()
    }

    /// Open the room for assignments.
    pub fn mark_done(&mut self) -> Result<(), DeskError> {
        if self.state == RoomState::Done {
            return Err(DeskError::InvalidTransition {
                action: "complete",
                state: "done",
            });
        }
        self.state = RoomState::Done;
        Ok(())
    }

    /// Change capacity. Shrinking below current occupancy is refused.
    pub fn set_capacity(&mut self, capacity: u32) -> Result<(), DeskError> {
        if capacity == 0 || capacity < self.occupancy().occupied {
            return Err(DeskError::Validation(format!(
                "Capacity {} is below the current occupancy of Room {}.",
                capacity, self.name
            )));
        }
        self.capacity = capacity;
        Ok(())
    }

    /// True when the person is checked in here.
    #[must_use]
    pub fn hosts(&self, occupant: &Occupant) -> bool {
        match occupant {
            Occupant::Internal { employee } => self.occupants.contains(employee),
            Occupant::External { guest, .. } => self.guests.contains(guest),
        }
    }

    /// Add the occupant and fix the allocation type if unset.
    pub fn check_in(&mut self, occupant: &Occupant) {
        match *occupant {
            Occupant::Internal { employee } => {
                self.occupants.insert(employee);
                self.allocation_type.get_or_insert(OccupancyType::Internal);
            }
            Occupant::External { guest, .. } => {
                self.guests.insert(guest);
                self.allocation_type.get_or_insert(OccupancyType::External);
            }
        }
    }

    /// Remove the occupant; an emptied room loses its allocation type.
    pub fn check_out(&mut self, occupant: &Occupant) {
        match *occupant {
            Occupant::Internal { employee } => {
                self.occupants.remove(&employee);
            }
            Occupant::External { guest, .. } => {
                self.guests.remove(&guest);
            }
        }
        if self.is_empty() {
            self.allocation_type = None;
        }
    }
}

// =============================================================================
// ROOM COSTS
// =============================================================================

/// Cost of a room: its assets plus the room type's additional charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCosts {
    pub assets_cents: i64,
    pub additional_cents: i64,
    pub total_cents: i64,
}

impl RoomCosts {
    pub fn compute<L: AssetLedger + ?Sized>(
        room: &Room,
        room_type: Option<&RoomType>,
        ledger: &L,
    ) -> Self {
        let assets_cents = room
            .assets
            .iter()
            .filter_map(|id| ledger.asset(*id))
            .fold(0i64, |acc, a| acc.saturating_add(a.cost_cents));
        let additional_cents = room_type.map(|t| t.additional_cost_cents).unwrap_or(0);
        Self {
            assets_cents,
            additional_cents,
            total_cents: assets_cents.saturating_add(additional_cents),
        }
    }
}

// =============================================================================
// ROOM ASSIGNMENT GUARDS
// =============================================================================

/// The room must be marked done.
pub struct RoomReady<'a>(pub &'a Room);

impl AllocationGuard<RoomOccupancy> for RoomReady<'_> {
    fn check(&self, _: &Allocation<RoomOccupancy>) -> Result<(), GuardFailure> {
        if self.0.state == RoomState::Done {
            Ok(())
        } else {
            Err(GuardFailure::RoomNotReady {
                room: self.0.name.clone(),
            })
        }
    }
}

/// Internal employees and external guests never share a room.
pub struct OccupancyTypeGuard<'a>(pub &'a Room);

impl AllocationGuard<RoomOccupancy> for OccupancyTypeGuard<'_> {
    fn check(&self, allocation: &Allocation<RoomOccupancy>) -> Result<(), GuardFailure> {
        match (self.0.allocation_type, allocation.holder.occupant.is_internal()) {
            (Some(OccupancyType::External), true) => Err(GuardFailure::RoomHoldsGuests),
            (Some(OccupancyType::Internal), false) => Err(GuardFailure::RoomHoldsEmployees),
            _ => Ok(()),
        }
    }
}

/// A person can only be checked in to one room at a time.
///
/// Holds the room the occupant currently stays in, if any.
pub struct SingleStay<'a>(pub Option<&'a Room>);

impl AllocationGuard<RoomOccupancy> for SingleStay<'_> {
    fn check(&self, allocation: &Allocation<RoomOccupancy>) -> Result<(), GuardFailure> {
        match self.0 {
            Some(room) => Err(GuardFailure::AlreadyCheckedIn {
                occupant: allocation.holder.occupant.to_string(),
                room: room.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// The room must have a free slot.
pub struct CapacityGuard<'a>(pub &'a Room);

impl AllocationGuard<RoomOccupancy> for CapacityGuard<'_> {
    fn check(&self, _: &Allocation<RoomOccupancy>) -> Result<(), GuardFailure> {
        if self.0.occupancy().is_full {
            Err(GuardFailure::RoomFull {
                room: self.0.name.clone(),
            })
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
