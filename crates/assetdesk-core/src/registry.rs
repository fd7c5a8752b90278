//! # Registry
//!
//! The in-memory store behind the desk. Every collection is a `BTreeMap`
//! keyed by record id, so iteration order (and therefore serialized bytes)
//! is deterministic.
//!
//! The registry holds data and lookups only. Multi-record transitions live
//! in [`crate::desk`], which runs them atomically.

use crate::allocation::{Allocation, AllocationKind, AllocationState, AssetLine};
use crate::asset::{Asset, AssetLedger, HolderRef};
use crate::checklist::Checklist;
use crate::clearance::ClearanceRequest;
use crate::custody::CustodyLog;
use crate::fleet::FleetBook;
use crate::holder::{Assignee, Custodian, Holder, Occupant, RoomOccupancy};
use crate::maintenance::{FollowUpRequest, MaintenanceBook};
use crate::notify::Outbox;
use crate::room::{Room, RoomType};
use crate::sequence::{SequenceCode, Sequencer};
use crate::ticket::Ticket;
use crate::{
    AllocationId, AssetId, ChecklistId, DeskError, EmployeeId, RecordId, RoomId, RoomTypeId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// PEOPLE AND RECIPIENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub email: Option<String>,
    /// Only flagged employees can take driver assignments.
    pub is_driver: bool,
}

/// Addresses notified by the rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    /// Approvers of expensive allocations; also told about escalations.
    pub approvers: Vec<String>,
    /// Fleet managers receiving document expiry alerts.
    pub fleet: Vec<String>,
    /// Helpdesk team receiving new tickets.
    pub helpdesk: Vec<String>,
}

// =============================================================================
// ALLOCATION RECORDS
// =============================================================================

/// An allocation of any kind, stored side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationRecord {
    Equipment(Allocation<Assignee>),
    /// IT assets and tools.
    Custody(Allocation<Custodian>),
    Room(Allocation<RoomOccupancy>),
}

macro_rules! each_allocation {
    ($record:expr, $alloc:ident => $body:expr) => {
        match $record {
            AllocationRecord::Equipment($alloc) => $body,
            AllocationRecord::Custody($alloc) => $body,
            AllocationRecord::Room($alloc) => $body,
        }
    };
}
pub(crate) use each_allocation;

impl AllocationRecord {
    #[must_use]
    pub fn id(&self) -> AllocationId {
        each_allocation!(self, a => a.id)
    }

    #[must_use]
    pub fn reference(&self) -> &str {
        each_allocation!(self, a => a.reference.as_str())
    }

    #[must_use]
    pub fn kind(&self) -> AllocationKind {
        each_allocation!(self, a => a.kind)
    }

    #[must_use]
    pub fn state(&self) -> AllocationState {
        each_allocation!(self, a => a.state)
    }

    #[must_use]
    pub fn lines(&self) -> &[AssetLine] {
        each_allocation!(self, a => a.lines.as_slice())
    }

    #[must_use]
    pub fn check_in(&self) -> Option<ChecklistId> {
        each_allocation!(self, a => a.check_in)
    }

    #[must_use]
    pub fn check_out(&self) -> Option<ChecklistId> {
        each_allocation!(self, a => a.check_out)
    }

    #[must_use]
    pub fn holder_ref(&self) -> HolderRef {
        each_allocation!(self, a => a.holder.holder_ref())
    }

    /// Human-readable holder for messages.
    #[must_use]
    pub fn holder_label(&self) -> String {
        each_allocation!(self, a => a.holder.label())
    }

    /// The room and occupant of a camp assignment.
    #[must_use]
    pub fn occupancy(&self) -> Option<&RoomOccupancy> {
        match self {
            Self::Room(a) => Some(&a.holder),
            _ => None,
        }
    }

    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        each_allocation!(self, a => a.rejection_reason.as_deref())
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Every record the desk manages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub assets: BTreeMap<AssetId, Asset>,
    pub employees: BTreeMap<EmployeeId, Employee>,
    pub rooms: BTreeMap<RoomId, Room>,
    pub room_types: BTreeMap<RoomTypeId, RoomType>,
    pub allocations: BTreeMap<AllocationId, AllocationRecord>,
    pub checklists: BTreeMap<ChecklistId, Checklist>,
    pub follow_ups: BTreeMap<RecordId, FollowUpRequest>,
    pub custody: CustodyLog,
    pub clearances: BTreeMap<RecordId, ClearanceRequest>,
    pub fleet: FleetBook,
    pub maintenance: MaintenanceBook,
    pub tickets: BTreeMap<RecordId, Ticket>,
    pub outbox: Outbox,
    pub recipients: Recipients,
    pub sequencer: Sequencer,
    pub(crate) next_id: u64,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh record id. Ids are unique across every collection.
    pub fn next_id(&mut self) -> u64 {
        self.next_id = self.next_id.saturating_add(1);
        self.next_id
    }

    /// Issue the next reference for `code`.
    pub fn reference(&mut self, code: impl Into<SequenceCode>) -> String {
        self.sequencer.next(code.into())
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn asset(&self, id: AssetId) -> Result<&Asset, DeskError> {
        self.assets
            .get(&id)
            .ok_or_else(|| DeskError::not_found("Asset", id.0))
    }

    pub fn employee(&self, id: EmployeeId) -> Result<&Employee, DeskError> {
        self.employees
            .get(&id)
            .ok_or_else(|| DeskError::not_found("Employee", id.0))
    }

    pub fn room(&self, id: RoomId) -> Result<&Room, DeskError> {
        self.rooms
            .get(&id)
            .ok_or_else(|| DeskError::not_found("Room", id.0))
    }

    pub fn room_type(&self, id: RoomTypeId) -> Result<&RoomType, DeskError> {
        self.room_types
            .get(&id)
            .ok_or_else(|| DeskError::not_found("Room type", id.0))
    }

    pub fn allocation(&self, id: AllocationId) -> Result<&AllocationRecord, DeskError> {
        self.allocations
            .get(&id)
            .ok_or_else(|| DeskError::not_found("Allocation", id.0))
    }

    pub fn checklist(&self, id: ChecklistId) -> Result<&Checklist, DeskError> {
        self.checklists
            .get(&id)
            .ok_or_else(|| DeskError::not_found("Checklist", id.0))
    }

    /// The room the person is currently checked in to.
    #[must_use]
    pub fn room_of(&self, occupant: &Occupant) -> Option<&Room> {
        self.rooms.values().find(|room| room.hosts(occupant))
    }

    /// Tags are unique across the register.
    #[must_use]
    pub fn tag_in_use(&self, tag: &str, except: Option<AssetId>) -> bool {
        self.assets
            .values()
            .any(|a| Some(a.id) != except && a.tag.as_deref() == Some(tag))
    }

    /// Current lines for a room: one per asset placed in the room.
    pub fn room_lines(&self, room: RoomId) -> Result<Vec<AssetLine>, DeskError> {
        Ok(self
            .room(room)?
            .assets
            .iter()
            .filter_map(|id| self.assets.get(id))
            .map(AssetLine::snapshot)
            .collect())
    }
}

impl AssetLedger for Registry {
    fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(&id)
    }

    fn asset_mut(&mut self, id: AssetId) -> Option<&mut Asset> {
        self.assets.get_mut(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionContext, GuestId, UserId};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut registry = Registry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert!(b > a);
    }

    #[test]
    fn room_of_finds_checked_in_guest() {
        let mut registry = Registry::new();
        let mut room = Room::new(RoomId(1), "C-12", 2).expect("room");
        let guest = Occupant::External {
            guest: GuestId(3),
            partner: None,
        };
        room.check_in(&guest);
        registry.rooms.insert(room.id, room);

        assert_eq!(registry.room_of(&guest).map(|r| r.id), Some(RoomId(1)));
        assert!(
            registry
                .room_of(&Occupant::Internal {
                    employee: EmployeeId(3)
                })
                .is_none()
        );
    }

    #[test]
    fn record_accessors_cover_every_kind() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("ts");
        let ctx = ActionContext::new(UserId(1), now);
        let record = AllocationRecord::Room(Allocation::new(
            AllocationId(4),
            "CRA/00001".to_string(),
            AllocationKind::Room,
            RoomOccupancy {
                room: RoomId(2),
                occupant: Occupant::Internal {
                    employee: EmployeeId(8),
                },
            },
            &ctx,
        ));
        assert_eq!(record.id(), AllocationId(4));
        assert_eq!(record.kind(), AllocationKind::Room);
        assert_eq!(record.holder_ref(), HolderRef::Room { room: RoomId(2) });
        assert_eq!(record.holder_label(), "Employee 8");
        assert!(record.occupancy().is_some());
    }

    #[test]
    fn tag_uniqueness_ignores_self() {
        let mut registry = Registry::new();
        let mut asset = Asset::new(AssetId(1), "Drill").expect("asset");
        asset.tag = Some("TL-1".to_string());
        registry.assets.insert(asset.id, asset);
        assert!(registry.tag_in_use("TL-1", None));
        assert!(!registry.tag_in_use("TL-1", Some(AssetId(1))));
    }
}
