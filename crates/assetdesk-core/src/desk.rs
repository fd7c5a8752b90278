//! # Desk
//!
//! The storage-agnostic facade over the [`Registry`].
//!
//! Every operation runs as a transaction: it works on a copy of the
//! registry, and only when every step succeeds is the copy persisted and
//! swapped in. A failed operation leaves both memory and disk untouched.
//!
//! ## Storage Backends
//!
//! - `InMemory`: the registry lives only in memory (tests, snapshot files)
//! - `Persistent`: every committed transaction is written to redb

use crate::allocation::{Allocation, AllocationGuard, AllocationKind, AllocationState, SubmitOutcome};
use crate::asset::{Asset, AssetClass, validate_tag};
use crate::checklist::{
    Checklist, ChecklistKind, ChecklistStatus, FlaggedLine, LineStatus, SourceMatch,
};
use crate::clearance::ClearanceRequest;
use crate::fleet::{AssignmentStatus, DriverAssignment, JobCard, JobCardState, ServiceLog,
    ServiceState, Trip, TripTicket, Vehicle};
use crate::formats::{registry_from_bytes, registry_to_bytes};
use crate::holder::{Assignee, Custodian, Occupant, RoomOccupancy};
use crate::maintenance::{FollowUpRequest, MaintenanceKind, MaintenancePlan, MaintenanceRequest,
    RequestState};
use crate::notify::{Notification, NotificationTopic};
use crate::registry::{AllocationRecord, Employee, Recipients, Registry, each_allocation};
use crate::room::{CapacityGuard, OccupancyTypeGuard, Room, RoomCosts, RoomReady, RoomType,
    SingleStay};
use crate::sequence::SequenceCode;
use crate::storage::RedbRegistry;
use crate::system::DeskMetrics;
use crate::ticket::{Ticket, TicketForm};
use crate::{
    ActionContext, AllocationId, AssetId, ChecklistId, DeskError, EmployeeId, GuestId, PartnerId,
    ProjectId, RecordId, RoomId, RoomTypeId, VehicleId, require_name,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// INPUTS AND REPORTS
// =============================================================================

/// Fields for registering an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAsset {
    pub name: String,
    pub tag: Option<String>,
    pub serial: Option<String>,
    pub class: AssetClass,
    pub expensive: bool,
    pub cost_cents: i64,
    pub room: Option<RoomId>,
}

/// The holder fields of an allocation form. Which ones are required
/// depends on the allocation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HolderInput {
    pub employee: Option<EmployeeId>,
    pub project: Option<ProjectId>,
    pub room: Option<RoomId>,
    pub guest: Option<GuestId>,
    pub partner: Option<PartnerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReport {
    pub outcome: SubmitOutcome,
    pub state: AllocationState,
    /// Set when approval is needed but nobody could be notified.
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub status: ChecklistStatus,
    pub flagged: Vec<FlaggedLine>,
    pub follow_ups: Vec<RecordId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub expiry_alerts: usize,
    pub maintenance_requests: Vec<RecordId>,
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Where committed transactions go.
#[derive(Debug, Default)]
pub enum StorageBackend {
    /// Nothing beyond memory; the caller saves snapshots explicitly.
    #[default]
    InMemory,
    /// Every commit is written to redb.
    Persistent(RedbRegistry),
}

// NOTE: Desk does not implement Clone; the redb handle cannot be shared.

/// Storage-agnostic facade running every transition atomically.
#[derive(Debug, Default)]
pub struct Desk {
    backend: StorageBackend,
    registry: Registry,
}

impl Desk {
    /// Create an empty in-memory desk.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing registry in memory.
    #[must_use]
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            backend: StorageBackend::InMemory,
            registry,
        }
    }

    /// Open (or create) a redb database and load its registry.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, DeskError> {
        let store = RedbRegistry::open(path)?;
        let registry = store.load()?;
        Ok(Self {
            backend: StorageBackend::Persistent(store),
            registry,
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Run `op` against a working copy; commit only on success.
    fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Registry) -> Result<T, DeskError>,
    ) -> Result<T, DeskError> {
        let mut working = self.registry.clone();
        let value = op(&mut working)?;
        if let StorageBackend::Persistent(store) = &self.backend {
            store.save(&working)?;
        }
        self.registry = working;
        Ok(value)
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Serialize the registry into the snapshot format.
    pub fn export_bytes(&self) -> Result<Vec<u8>, DeskError> {
        registry_to_bytes(&self.registry)
    }

    /// Replace the whole registry with a decoded snapshot.
    pub fn import_bytes(&mut self, bytes: &[u8]) -> Result<(), DeskError> {
        let imported = registry_from_bytes(bytes)?;
        self.transact(move |reg| {
            *reg = imported;
            Ok(())
        })
    }

    /// Put back a registry taken earlier with `registry().clone()`, for
    /// callers whose own write-out failed after a commit.
    pub fn restore(&mut self, registry: Registry) -> Result<(), DeskError> {
        self.transact(move |reg| {
            *reg = registry;
            Ok(())
        })
    }

    #[must_use]
    pub fn metrics(&self) -> DeskMetrics {
        DeskMetrics::collect(&self.registry)
    }

    // =========================================================================
    // MASTER DATA
    // =========================================================================

    pub fn add_asset(&mut self, input: NewAsset) -> Result<AssetId, DeskError> {
        self.transact(move |reg| {
            let id = AssetId(reg.next_id());
            let mut asset = Asset::new(id, &input.name)?;
            if let Some(tag) = input.tag.as_deref() {
                let tag = validate_tag(tag)?;
                if reg.tag_in_use(&tag, None) {
                    return Err(DeskError::Validation(format!(
                        "Asset Tag {} is already in use.",
                        tag
                    )));
                }
                asset.tag = Some(tag);
            }
            if input.cost_cents < 0 {
                return Err(DeskError::Validation(
                    "Asset cost cannot be negative.".to_string(),
                ));
            }
            asset.serial = input
                .serial
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            asset.class = input.class;
            asset.expensive = input.expensive;
            asset.cost_cents = input.cost_cents;
            if let Some(room_id) = input.room {
                let room = reg
                    .rooms
                    .get_mut(&room_id)
                    .ok_or_else(|| DeskError::not_found("Room", room_id.0))?;
                room.assets.insert(id);
                asset.room = Some(room_id);
            }
            reg.assets.insert(id, asset);
            Ok(id)
        })
    }

    pub fn validate_asset(&mut self, id: AssetId) -> Result<(), DeskError> {
        self.transact(|reg| asset_mut(reg, id)?.validate())
    }

    pub fn scrap_asset(&mut self, id: AssetId) -> Result<(), DeskError> {
        self.transact(|reg| asset_mut(reg, id)?.scrap())
    }

    /// Move an asset into a room (or out of every room). Assets in custody
    /// stay where they are.
    pub fn place_asset(&mut self, id: AssetId, room: Option<RoomId>) -> Result<(), DeskError> {
        self.transact(|reg| {
            let asset = reg.asset(id)?;
            if asset.is_bound() {
                return Err(DeskError::Validation(
                    "You cannot move an allocated asset.".to_string(),
                ));
            }
            if let Some(target) = room {
                reg.room(target)?;
            }
            if let Some(previous) = asset.room {
                if let Some(old) = reg.rooms.get_mut(&previous) {
                    old.assets.remove(&id);
                }
            }
            if let Some(target) = room {
                if let Some(new) = reg.rooms.get_mut(&target) {
                    new.assets.insert(id);
                }
            }
            asset_mut(reg, id)?.room = room;
            Ok(())
        })
    }

    pub fn add_employee(
        &mut self,
        name: &str,
        email: Option<String>,
        is_driver: bool,
    ) -> Result<EmployeeId, DeskError> {
        let name = require_name("Name", name)?;
        self.transact(move |reg| {
            let id = EmployeeId(reg.next_id());
            reg.employees.insert(
                id,
                Employee {
                    id,
                    name,
                    email: email.filter(|e| !e.trim().is_empty()),
                    is_driver,
                },
            );
            Ok(id)
        })
    }

    pub fn set_recipients(&mut self, recipients: Recipients) -> Result<(), DeskError> {
        self.transact(move |reg| {
            reg.recipients = recipients;
            Ok(())
        })
    }

    // =========================================================================
    // ROOMS
    // =========================================================================

    pub fn add_room_type(
        &mut self,
        name: &str,
        additional_cost_cents: i64,
        template: BTreeSet<AssetId>,
    ) -> Result<RoomTypeId, DeskError> {
        let name = require_name("Room type", name)?;
        self.transact(move |reg| {
            for asset in &template {
                reg.asset(*asset)?;
            }
            let id = RoomTypeId(reg.next_id());
            reg.room_types.insert(
                id,
                RoomType {
                    id,
                    name,
                    additional_cost_cents,
                    template,
                },
            );
            Ok(id)
        })
    }

    pub fn add_room(
        &mut self,
        name: &str,
        block: Option<String>,
        capacity: u32,
        room_type: Option<RoomTypeId>,
    ) -> Result<RoomId, DeskError> {
        self.transact(|reg| {
            if let Some(t) = room_type {
                reg.room_type(t)?;
            }
            let id = RoomId(reg.next_id());
            let mut room = Room::new(id, name, capacity)?;
            room.block = block;
            room.room_type = room_type;
            reg.rooms.insert(id, room);
            Ok(id)
        })
    }

    pub fn mark_room_done(&mut self, id: RoomId) -> Result<(), DeskError> {
        self.transact(|reg| room_mut(reg, id)?.mark_done())
    }

    pub fn set_room_capacity(&mut self, id: RoomId, capacity: u32) -> Result<(), DeskError> {
        self.transact(|reg| room_mut(reg, id)?.set_capacity(capacity))
    }

    pub fn room_costs(&self, id: RoomId) -> Result<RoomCosts, DeskError> {
        let room = self.registry.room(id)?;
        let room_type = room
            .room_type
            .and_then(|t| self.registry.room_types.get(&t));
        Ok(RoomCosts::compute(room, room_type, &self.registry))
    }

    // =========================================================================
    // ALLOCATIONS
    // =========================================================================

    /// Create a draft allocation with a sequenced reference.
    pub fn create_allocation(
        &mut self,
        ctx: &ActionContext,
        kind: AllocationKind,
        input: HolderInput,
    ) -> Result<AllocationId, DeskError> {
        self.transact(|reg| {
            let record = match kind {
                AllocationKind::Equipment => {
                    let holder = Assignee::from_parts(input.employee, input.project)?;
                    if let Assignee::Employee(employee) = holder {
                        reg.employee(employee)?;
                    }
                    let (id, reference) = allocation_identity(reg, kind);
                    AllocationRecord::Equipment(Allocation::new(
                        id, reference, kind, holder, ctx,
                    ))
                }
                AllocationKind::It | AllocationKind::Tools => {
                    let employee = input.employee.ok_or_else(|| {
                        DeskError::Validation("Employee is Required.".to_string())
                    })?;
                    reg.employee(employee)?;
                    let holder = Custodian {
                        employee,
                        project: input.project,
                    };
                    let (id, reference) = allocation_identity(reg, kind);
                    AllocationRecord::Custody(Allocation::new(
                        id, reference, kind, holder, ctx,
                    ))
                }
                AllocationKind::Room => {
                    let room = input
                        .room
                        .ok_or_else(|| DeskError::Validation("Room is Required.".to_string()))?;
                    reg.room(room)?;
                    let occupant = Occupant::from_parts(input.employee, input.guest, input.partner)?;
                    if let Occupant::Internal { employee } = occupant {
                        reg.employee(employee)?;
                    }
                    let (id, reference) = allocation_identity(reg, kind);
                    let mut allocation = Allocation::new(
                        id,
                        reference,
                        kind,
                        RoomOccupancy { room, occupant },
                        ctx,
                    );
                    allocation.sync_lines(reg.room_lines(room)?)?;
                    AllocationRecord::Room(allocation)
                }
            };
            let id = record.id();
            reg.allocations.insert(id, record);
            Ok(id)
        })
    }

    /// Attach an asset to a draft equipment, IT or tools allocation.
    pub fn add_allocation_asset(
        &mut self,
        id: AllocationId,
        asset: AssetId,
    ) -> Result<(), DeskError> {
        self.transact(|reg| {
            let asset = reg.asset(asset)?.clone();
            let record = allocation_mut(reg, id)?;
            check_class(record.kind(), &asset)?;
            match record {
                AllocationRecord::Equipment(a) => a.add_asset(&asset),
                AllocationRecord::Custody(a) => a.add_asset(&asset),
                AllocationRecord::Room(_) => Err(DeskError::Validation(
                    "Room assignments take their assets from the room.".to_string(),
                )),
            }
        })
    }

    pub fn remove_allocation_asset(
        &mut self,
        id: AllocationId,
        asset: AssetId,
    ) -> Result<bool, DeskError> {
        self.transact(|reg| {
            each_allocation!(allocation_mut(reg, id)?, a => a.remove_asset(asset))
        })
    }

    /// Submit a draft. Expensive requests wait for approval and notify the
    /// approvers.
    pub fn submit(
        &mut self,
        ctx: &ActionContext,
        id: AllocationId,
    ) -> Result<SubmitReport, DeskError> {
        self.transact(|reg| {
            sync_room_lines(reg, id)?;
            let record = reg
                .allocations
                .get_mut(&id)
                .ok_or_else(|| DeskError::not_found("Allocation", id.0))?;
            let outcome = each_allocation!(record, a => a.submit(&reg.assets))?;
            let state = record.state();

            let mut warning = None;
            if outcome == SubmitOutcome::AwaitingApproval {
                let reference = record.reference().to_string();
                let holder = record.holder_label();
                if reg.recipients.approvers.is_empty() {
                    warning = Some(
                        "No approvers are configured; nobody was notified.".to_string(),
                    );
                } else {
                    reg.outbox.push(Notification {
                        topic: NotificationTopic::ApprovalRequired,
                        recipients: reg.recipients.approvers.clone(),
                        subject: format!("Approval required: {}", reference),
                        body: format!(
                            "Allocation {} for {} includes expensive assets and is waiting for your approval.",
                            reference, holder
                        ),
                        queued_at: ctx.now,
                    });
                }
            }
            Ok(SubmitReport {
                outcome,
                state,
                warning,
            })
        })
    }

    pub fn approve(&mut self, ctx: &ActionContext, id: AllocationId) -> Result<(), DeskError> {
        self.transact(|reg| each_allocation!(allocation_mut(reg, id)?, a => a.approve(ctx)))
    }

    pub fn reset_to_draft(&mut self, id: AllocationId) -> Result<(), DeskError> {
        self.transact(|reg| each_allocation!(allocation_mut(reg, id)?, a => a.reset_to_draft()))
    }

    pub fn cancel(&mut self, id: AllocationId) -> Result<(), DeskError> {
        self.transact(|reg| {
            let record = reg
                .allocations
                .get_mut(&id)
                .ok_or_else(|| DeskError::not_found("Allocation", id.0))?;
            let was_allocated = record.state() == AllocationState::Allocated;
            each_allocation!(record, a => a.cancel(&mut reg.assets))?;
            if was_allocated {
                leave_room(&mut reg.rooms, record.occupancy());
            }
            Ok(())
        })
    }

    pub fn reject(&mut self, id: AllocationId, reason: &str) -> Result<(), DeskError> {
        self.transact(|reg| {
            let record = reg
                .allocations
                .get_mut(&id)
                .ok_or_else(|| DeskError::not_found("Allocation", id.0))?;
            let was_allocated = record.state() == AllocationState::Allocated;
            each_allocation!(record, a => a.reject(&mut reg.assets, reason))?;
            if was_allocated {
                leave_room(&mut reg.rooms, record.occupancy());
            }
            Ok(())
        })
    }

    /// Open (or top up) the check-in or check-out checklist of an allocation.
    ///
    /// A check-in runs the line, asset and kind guards first. A check-out
    /// needs an allocated record and skips validation.
    pub fn open_checklist(
        &mut self,
        ctx: &ActionContext,
        id: AllocationId,
        kind: ChecklistKind,
    ) -> Result<ChecklistId, DeskError> {
        self.transact(|reg| {
            sync_room_lines(reg, id)?;
            let record = reg.allocation(id)?;
            let existing = match kind {
                ChecklistKind::CheckIn => {
                    if !record.state().can_allocate() {
                        return Err(DeskError::InvalidTransition {
                            action: "open a check-in checklist for",
                            state: record.state().name(),
                        });
                    }
                    check_record_assets(reg, record)?;
                    record.check_in()
                }
                ChecklistKind::CheckOut => {
                    if record.state() != AllocationState::Allocated {
                        return Err(DeskError::InvalidTransition {
                            action: "open a check-out checklist for",
                            state: record.state().name(),
                        });
                    }
                    record.check_out()
                }
            };
            let lines = record.lines().to_vec();
            let holder = record.holder_ref();

            if let Some(checklist_id) = existing {
                let checklist = reg
                    .checklists
                    .get_mut(&checklist_id)
                    .ok_or_else(|| DeskError::not_found("Checklist", checklist_id.0))?;
                if checklist.is_pending() {
                    checklist.sync(&lines)?;
                }
                return Ok(checklist_id);
            }

            let checklist_id = ChecklistId(reg.next_id());
            let reference = reg.reference(kind);
            reg.checklists.insert(
                checklist_id,
                Checklist::open(checklist_id, reference, kind, id, holder, &lines, ctx.now),
            );
            each_allocation!(allocation_mut(reg, id)?, a => match kind {
                ChecklistKind::CheckIn => a.check_in = Some(checklist_id),
                ChecklistKind::CheckOut => a.check_out = Some(checklist_id),
            });
            Ok(checklist_id)
        })
    }

    /// Bind the allocation's assets to its holder.
    pub fn allocate(&mut self, ctx: &ActionContext, id: AllocationId) -> Result<(), DeskError> {
        self.transact(|reg| {
            sync_room_lines(reg, id)?;
            let record = reg
                .allocations
                .get_mut(&id)
                .ok_or_else(|| DeskError::not_found("Allocation", id.0))?;
            let check_in = match record.check_in() {
                Some(c) => Some(
                    reg.checklists
                        .get(&c)
                        .ok_or_else(|| DeskError::not_found("Checklist", c.0))?,
                ),
                None => None,
            };
            match record {
                AllocationRecord::Equipment(a) => a.allocate(ctx, &mut reg.assets, check_in, &[]),
                AllocationRecord::Custody(a) => a.allocate(ctx, &mut reg.assets, check_in, &[]),
                AllocationRecord::Room(a) => {
                    let room = reg
                        .rooms
                        .get(&a.holder.room)
                        .ok_or_else(|| DeskError::not_found("Room", a.holder.room.0))?;
                    let current = reg.rooms.values().find(|r| r.hosts(&a.holder.occupant));
                    let guards: [&dyn AllocationGuard<RoomOccupancy>; 4] = [
                        &RoomReady(room),
                        &OccupancyTypeGuard(room),
                        &SingleStay(current),
                        &CapacityGuard(room),
                    ];
                    a.allocate(ctx, &mut reg.assets, check_in, &guards)?;
                    let occupancy = a.holder;
                    if let Some(room) = reg.rooms.get_mut(&occupancy.room) {
                        room.check_in(&occupancy.occupant);
                    }
                    Ok(())
                }
            }
        })
    }

    /// Release the allocation's assets after a verified check-out.
    pub fn return_allocation(
        &mut self,
        ctx: &ActionContext,
        id: AllocationId,
    ) -> Result<(), DeskError> {
        self.transact(|reg| {
            let record = reg
                .allocations
                .get_mut(&id)
                .ok_or_else(|| DeskError::not_found("Allocation", id.0))?;
            let check_out = match record.check_out() {
                Some(c) => Some(
                    reg.checklists
                        .get(&c)
                        .ok_or_else(|| DeskError::not_found("Checklist", c.0))?,
                ),
                None => None,
            };
            each_allocation!(record, a => a.return_assets(ctx, &mut reg.assets, check_out))?;
            leave_room(&mut reg.rooms, record.occupancy());
            Ok(())
        })
    }

    // =========================================================================
    // CHECKLISTS
    // =========================================================================

    pub fn set_checklist_line(
        &mut self,
        id: ChecklistId,
        asset: AssetId,
        status: Option<LineStatus>,
        remarks: Option<String>,
    ) -> Result<(), DeskError> {
        self.transact(|reg| checklist_mut(reg, id)?.set_line_status(asset, status, remarks))
    }

    pub fn attach_document(
        &mut self,
        ctx: &ActionContext,
        id: ChecklistId,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<(), DeskError> {
        self.transact(|reg| checklist_mut(reg, id)?.attach_document(ctx, filename, content))
    }

    /// Verify a checklist, escalating any missing or damaged line.
    ///
    /// Escalation marks the assets, spawns one follow-up request per flagged
    /// line and notifies the approvers. Every line is written to the custody
    /// log.
    pub fn verify_checklist(
        &mut self,
        ctx: &ActionContext,
        id: ChecklistId,
    ) -> Result<VerifyReport, DeskError> {
        self.transact(|reg| {
            let (expected, mode) = expected_assets(reg, reg.checklist(id)?)?;
            let checklist = reg
                .checklists
                .get_mut(&id)
                .ok_or_else(|| DeskError::not_found("Checklist", id.0))?;
            let flagged = checklist.verify(ctx, &mut reg.assets, &expected, mode)?;
            let verified = checklist.clone();

            reg.custody.record(&verified, ctx.today());

            let mut follow_ups = Vec::with_capacity(flagged.len());
            for line in &flagged {
                let follow_up = RecordId(reg.next_id());
                let reference = reg.reference(SequenceCode::FollowUp);
                reg.follow_ups.insert(
                    follow_up,
                    FollowUpRequest::from_flagged(follow_up, reference, &verified, line),
                );
                follow_ups.push(follow_up);
            }

            if !flagged.is_empty() && !reg.recipients.approvers.is_empty() {
                let assets = flagged
                    .iter()
                    .map(|f| f.asset.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                reg.outbox.push(Notification {
                    topic: NotificationTopic::ChecklistEscalated,
                    recipients: reg.recipients.approvers.clone(),
                    subject: format!("{} checklist {} escalated", verified.kind, verified.reference),
                    body: format!(
                        "Assets reported missing or damaged: {}. Follow-up requests were opened.",
                        assets
                    ),
                    queued_at: ctx.now,
                });
            }

            Ok(VerifyReport {
                status: verified.status,
                flagged,
                follow_ups,
            })
        })
    }

    pub fn reset_checklist(&mut self, id: ChecklistId) -> Result<(), DeskError> {
        self.transact(|reg| {
            checklist_mut(reg, id)?.reset();
            Ok(())
        })
    }

    pub fn advance_follow_up(&mut self, id: RecordId) -> Result<(), DeskError> {
        self.transact(|reg| {
            reg.follow_ups
                .get_mut(&id)
                .ok_or_else(|| DeskError::not_found("Follow-up request", id.0))?
                .advance()
        })
    }

    // =========================================================================
    // CLEARANCE
    // =========================================================================

    pub fn create_clearance(
        &mut self,
        ctx: &ActionContext,
        employee: EmployeeId,
        room: RoomId,
    ) -> Result<RecordId, DeskError> {
        self.transact(|reg| {
            reg.employee(employee)?;
            reg.room(room)?;
            let id = RecordId(reg.next_id());
            let reference = reg.reference(SequenceCode::Clearance);
            reg.clearances.insert(
                id,
                ClearanceRequest::new(id, reference, employee, room, ctx.today()),
            );
            Ok(id)
        })
    }

    pub fn process_clearance(
        &mut self,
        id: RecordId,
        checklist: ChecklistId,
    ) -> Result<(), DeskError> {
        self.transact(|reg| {
            let checklist = reg
                .checklists
                .get(&checklist)
                .ok_or_else(|| DeskError::not_found("Checklist", checklist.0))?;
            if checklist.kind != ChecklistKind::CheckOut {
                return Err(DeskError::Validation(
                    "Clearance needs a check-out checklist.".to_string(),
                ));
            }
            reg.clearances
                .get_mut(&id)
                .ok_or_else(|| DeskError::not_found("Clearance request", id.0))?
                .process(checklist)
        })
    }

    // =========================================================================
    // FLEET
    // =========================================================================

    pub fn add_vehicle(&mut self, mut vehicle: Vehicle) -> Result<VehicleId, DeskError> {
        self.transact(move |reg| {
            vehicle.id = VehicleId(reg.next_id());
            let id = vehicle.id;
            reg.fleet.add_vehicle(vehicle)?;
            Ok(id)
        })
    }

    pub fn add_service_log(&mut self, mut service: ServiceLog) -> Result<RecordId, DeskError> {
        self.transact(move |reg| {
            service.id = RecordId(reg.next_id());
            let id = service.id;
            reg.fleet.add_service(service)?;
            Ok(id)
        })
    }

    pub fn set_service_state(&mut self, id: RecordId, state: ServiceState) -> Result<(), DeskError> {
        self.transact(|reg| reg.fleet.set_service_state(id, state))
    }

    pub fn add_trip(&mut self, mut trip: Trip) -> Result<RecordId, DeskError> {
        self.transact(move |reg| {
            trip.id = RecordId(reg.next_id());
            let id = trip.id;
            reg.fleet.add_trip(trip)?;
            Ok(id)
        })
    }

    pub fn add_trip_ticket(&mut self, mut ticket: TripTicket) -> Result<RecordId, DeskError> {
        self.transact(move |reg| {
            if let Some(driver) = ticket.driver {
                reg.employee(driver)?;
            }
            ticket.id = RecordId(reg.next_id());
            let id = ticket.id;
            reg.fleet.add_trip_ticket(ticket)?;
            Ok(id)
        })
    }

    pub fn add_driver_assignment(
        &mut self,
        mut assignment: DriverAssignment,
    ) -> Result<RecordId, DeskError> {
        self.transact(move |reg| {
            let is_driver = reg.employee(assignment.driver)?.is_driver;
            assignment.id = RecordId(reg.next_id());
            let id = assignment.id;
            reg.fleet.add_driver_assignment(assignment, is_driver)?;
            Ok(id)
        })
    }

    pub fn set_assignment_status(
        &mut self,
        id: RecordId,
        status: AssignmentStatus,
    ) -> Result<(), DeskError> {
        self.transact(|reg| reg.fleet.set_assignment_status(id, status))
    }

    pub fn open_job_card(&mut self, mut card: JobCard) -> Result<RecordId, DeskError> {
        self.transact(move |reg| {
            card.id = RecordId(reg.next_id());
            card.reference = reg.reference(SequenceCode::JobCard);
            card.state = JobCardState::Open;
            let id = card.id;
            reg.fleet.add_job_card(card)?;
            Ok(id)
        })
    }

    pub fn close_job_card(
        &mut self,
        id: RecordId,
        time_out: Option<DateTime<Utc>>,
    ) -> Result<(), DeskError> {
        self.transact(|reg| reg.fleet.close_job_card(id, time_out))
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    pub fn set_maintenance_plan(&mut self, plan: MaintenancePlan) -> Result<(), DeskError> {
        self.transact(move |reg| {
            reg.asset(plan.asset)?;
            reg.maintenance.set_plan(plan);
            Ok(())
        })
    }

    pub fn open_maintenance_request(
        &mut self,
        asset: AssetId,
        kind: MaintenanceKind,
        request_date: NaiveDate,
        description: Option<String>,
    ) -> Result<RecordId, DeskError> {
        self.transact(move |reg| {
            reg.asset(asset)?;
            open_request(reg, asset, kind, request_date, description)
        })
    }

    pub fn set_maintenance_state(
        &mut self,
        id: RecordId,
        state: RequestState,
    ) -> Result<(), DeskError> {
        self.transact(|reg| reg.maintenance.set_request_state(id, state))
    }

    // =========================================================================
    // SCHEDULED JOBS
    // =========================================================================

    /// Queue one notification per vehicle document expiring exactly 30, 15
    /// or 7 days after the run date.
    pub fn run_expiry_alerts(&mut self, ctx: &ActionContext) -> Result<usize, DeskError> {
        self.transact(|reg| Ok(queue_expiry_alerts(reg, ctx)))
    }

    /// Advance due maintenance plans and open their preventive requests.
    pub fn run_maintenance_recurrence(&mut self) -> Result<Vec<RecordId>, DeskError> {
        self.transact(advance_maintenance)
    }

    /// Both daily jobs in one transaction.
    pub fn run_daily_jobs(&mut self, ctx: &ActionContext) -> Result<JobReport, DeskError> {
        self.transact(|reg| {
            let expiry_alerts = queue_expiry_alerts(reg, ctx);
            let maintenance_requests = advance_maintenance(reg)?;
            Ok(JobReport {
                expiry_alerts,
                maintenance_requests,
            })
        })
    }

    /// Take every queued notification for delivery.
    pub fn drain_outbox(&mut self) -> Result<Vec<Notification>, DeskError> {
        if self.registry.outbox.is_empty() {
            return Ok(Vec::new());
        }
        self.transact(|reg| Ok(reg.outbox.drain()))
    }

    // =========================================================================
    // HELPDESK
    // =========================================================================

    /// Record a public helpdesk submission.
    pub fn submit_ticket(
        &mut self,
        now: DateTime<Utc>,
        form: TicketForm,
    ) -> Result<Ticket, DeskError> {
        self.transact(move |reg| {
            let id = RecordId(reg.next_id());
            let reference = reg.reference(SequenceCode::Ticket);
            let ticket = Ticket::from_form(id, reference, form, now)?;
            if !reg.recipients.helpdesk.is_empty() {
                reg.outbox.push(Notification {
                    topic: NotificationTopic::TicketReceived,
                    recipients: reg.recipients.helpdesk.clone(),
                    subject: format!("New helpdesk ticket {}", ticket.reference),
                    body: format!(
                        "{} <{}> opened ticket {}.",
                        ticket.contact_name, ticket.email, ticket.reference
                    ),
                    queued_at: now,
                });
            }
            reg.tickets.insert(id, ticket.clone());
            Ok(ticket)
        })
    }
}

// =============================================================================
// TRANSACTION HELPERS
// =============================================================================

fn asset_mut(reg: &mut Registry, id: AssetId) -> Result<&mut Asset, DeskError> {
    reg.assets
        .get_mut(&id)
        .ok_or_else(|| DeskError::not_found("Asset", id.0))
}

fn room_mut(reg: &mut Registry, id: RoomId) -> Result<&mut Room, DeskError> {
    reg.rooms
        .get_mut(&id)
        .ok_or_else(|| DeskError::not_found("Room", id.0))
}

fn allocation_mut(reg: &mut Registry, id: AllocationId) -> Result<&mut AllocationRecord, DeskError> {
    reg.allocations
        .get_mut(&id)
        .ok_or_else(|| DeskError::not_found("Allocation", id.0))
}

fn checklist_mut(reg: &mut Registry, id: ChecklistId) -> Result<&mut Checklist, DeskError> {
    reg.checklists
        .get_mut(&id)
        .ok_or_else(|| DeskError::not_found("Checklist", id.0))
}

fn allocation_identity(reg: &mut Registry, kind: AllocationKind) -> (AllocationId, String) {
    (AllocationId(reg.next_id()), reg.reference(kind))
}

fn leave_room(
    rooms: &mut BTreeMap<RoomId, Room>,
    occupancy: Option<&RoomOccupancy>,
) {
    if let Some(occupancy) = occupancy {
        if let Some(room) = rooms.get_mut(&occupancy.room) {
            room.check_out(&occupancy.occupant);
        }
    }
}

/// Each register feeds exactly one allocation kind.
fn check_class(kind: AllocationKind, asset: &Asset) -> Result<(), DeskError> {
    let expected = match kind {
        AllocationKind::Equipment => AssetClass::General,
        AllocationKind::It => AssetClass::It,
        AllocationKind::Tools => AssetClass::Tool,
        AllocationKind::Room => AssetClass::Camp,
    };
    if asset.class == expected {
        Ok(())
    } else {
        Err(DeskError::Validation(format!(
            "Asset {} is a {} asset; this allocation only takes {} assets.",
            asset.name,
            asset.class.name(),
            expected.name()
        )))
    }
}

/// Room assignments mirror the room's current assets while still editable.
fn sync_room_lines(reg: &mut Registry, id: AllocationId) -> Result<(), DeskError> {
    let room = match reg.allocation(id)? {
        AllocationRecord::Room(a)
            if a.state.can_allocate() || a.state == AllocationState::Pending =>
        {
            a.holder.room
        }
        _ => return Ok(()),
    };
    let lines = reg.room_lines(room)?;
    if let Some(AllocationRecord::Room(a)) = reg.allocations.get_mut(&id) {
        a.sync_lines(lines)?;
    }
    Ok(())
}

/// Guards 1 to 3 of `allocate`, as run when a check-in checklist opens.
fn check_record_assets(reg: &Registry, record: &AllocationRecord) -> Result<(), DeskError> {
    match record {
        AllocationRecord::Equipment(a) => a.check_assets(&reg.assets, &[])?,
        AllocationRecord::Custody(a) => a.check_assets(&reg.assets, &[])?,
        AllocationRecord::Room(a) => {
            let room = reg.room(a.holder.room)?;
            let current = reg.room_of(&a.holder.occupant);
            let guards: [&dyn AllocationGuard<RoomOccupancy>; 4] = [
                &RoomReady(room),
                &OccupancyTypeGuard(room),
                &SingleStay(current),
                &CapacityGuard(room),
            ];
            a.check_assets(&reg.assets, &guards)?;
        }
    }
    Ok(())
}

/// What a checklist is compared with on verification.
///
/// Camp checklists must list exactly the room type's template when one is
/// defined; everything else must cover the allocation's assets.
fn expected_assets(
    reg: &Registry,
    checklist: &Checklist,
) -> Result<(BTreeSet<AssetId>, SourceMatch), DeskError> {
    let template = checklist
        .room
        .and_then(|r| reg.rooms.get(&r))
        .and_then(|room| room.room_type)
        .and_then(|t| reg.room_types.get(&t))
        .map(|t| &t.template)
        .filter(|t| !t.is_empty());
    if let Some(template) = template {
        return Ok((template.clone(), SourceMatch::Exact));
    }
    let record = reg.allocation(checklist.allocation)?;
    Ok((
        record.lines().iter().map(|l| l.asset).collect(),
        SourceMatch::Superset,
    ))
}

fn open_request(
    reg: &mut Registry,
    asset: AssetId,
    kind: MaintenanceKind,
    request_date: NaiveDate,
    description: Option<String>,
) -> Result<RecordId, DeskError> {
    let id = RecordId(reg.next_id());
    let reference = reg.reference(SequenceCode::Maintenance);
    reg.maintenance.open_request(MaintenanceRequest {
        id,
        reference,
        asset,
        kind,
        request_date,
        state: RequestState::New,
        description,
    })?;
    Ok(id)
}

fn advance_maintenance(reg: &mut Registry) -> Result<Vec<RecordId>, DeskError> {
    let due = reg.maintenance.advance_plans();
    due.into_iter()
        .map(|d| open_request(reg, d.asset, MaintenanceKind::Preventive, d.request_date, None))
        .collect()
}

fn queue_expiry_alerts(reg: &mut Registry, ctx: &ActionContext) -> usize {
    let alerts = reg.fleet.expiry_alerts(ctx.today());
    for alert in &alerts {
        reg.outbox.push(Notification {
            topic: NotificationTopic::DocumentExpiry,
            recipients: reg.recipients.fleet.clone(),
            subject: alert.subject(),
            body: alert.body(),
            queued_at: ctx.now,
        });
    }
    alerts.len()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetState, UserId};
    use chrono::TimeZone;

    fn ctx() -> ActionContext {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("ts");
        ActionContext::new(UserId(1), now)
    }

    fn laptop(desk: &mut Desk, expensive: bool) -> AssetId {
        let id = desk
            .add_asset(NewAsset {
                name: "Laptop".to_string(),
                class: AssetClass::It,
                expensive,
                cost_cents: 150_000,
                ..NewAsset::default()
            })
            .expect("asset");
        desk.validate_asset(id).expect("validate");
        id
    }

    fn it_allocation(desk: &mut Desk, asset: AssetId) -> AllocationId {
        let employee = desk.add_employee("Omar", None, false).expect("employee");
        let id = desk
            .create_allocation(
                &ctx(),
                AllocationKind::It,
                HolderInput {
                    employee: Some(employee),
                    ..HolderInput::default()
                },
            )
            .expect("allocation");
        desk.add_allocation_asset(id, asset).expect("line");
        id
    }

    #[test]
    fn failed_transition_leaves_registry_untouched() {
        let mut desk = Desk::new();
        let asset = laptop(&mut desk, false);
        let id = it_allocation(&mut desk, asset);
        let before = desk.registry().clone();

        let err = desk.allocate(&ctx(), id).expect_err("no checklist");
        assert_eq!(
            err.to_string(),
            "Please check and verify the Check-In Checklist."
        );
        assert_eq!(desk.registry(), &before);
    }

    #[test]
    fn restore_rolls_back_a_committed_change() {
        let mut desk = Desk::new();
        let before = desk.registry().clone();
        desk.add_employee("Ghost", None, false).expect("employee");
        assert_eq!(desk.registry().employees.len(), 1);

        desk.restore(before.clone()).expect("restore");
        assert_eq!(desk.registry(), &before);
    }

    #[test]
    fn references_follow_kind_sequences() {
        let mut desk = Desk::new();
        let asset = laptop(&mut desk, false);
        let id = it_allocation(&mut desk, asset);
        assert_eq!(desk.registry().allocation(id).expect("record").reference(), "ITA/00001");
        let checklist = desk
            .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
            .expect("open");
        assert_eq!(
            desk.registry().checklist(checklist).expect("checklist").reference,
            "CKI/00001"
        );
    }

    #[test]
    fn class_mismatch_rejected() {
        let mut desk = Desk::new();
        let drill = desk
            .add_asset(NewAsset {
                name: "Drill".to_string(),
                class: AssetClass::Tool,
                ..NewAsset::default()
            })
            .expect("asset");
        let laptop = laptop(&mut desk, false);
        let id = it_allocation(&mut desk, laptop);
        let err = desk.add_allocation_asset(id, drill).expect_err("mismatch");
        assert_eq!(
            err.to_string(),
            "Asset Drill is a tool asset; this allocation only takes it assets."
        );
    }

    #[test]
    fn expensive_submission_without_approvers_warns() {
        let mut desk = Desk::new();
        let asset = laptop(&mut desk, true);
        let id = it_allocation(&mut desk, asset);
        let report = desk.submit(&ctx(), id).expect("submit");
        assert_eq!(report.outcome, SubmitOutcome::AwaitingApproval);
        assert!(report.warning.is_some());
        assert!(desk.registry().outbox.is_empty());
    }

    #[test]
    fn expensive_submission_notifies_approvers() {
        let mut desk = Desk::new();
        desk.set_recipients(Recipients {
            approvers: vec!["lead@example.com".to_string()],
            ..Recipients::default()
        })
        .expect("recipients");
        let asset = laptop(&mut desk, true);
        let id = it_allocation(&mut desk, asset);
        let report = desk.submit(&ctx(), id).expect("submit");
        assert_eq!(report.state, AllocationState::Pending);
        assert!(report.warning.is_none());
        let queued = desk.drain_outbox().expect("drain");
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].subject, "Approval required: ITA/00001");
    }

    #[test]
    fn full_custody_cycle() {
        let mut desk = Desk::new();
        let asset = laptop(&mut desk, false);
        let id = it_allocation(&mut desk, asset);

        let check_in = desk
            .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
            .expect("open");
        desk.attach_document(&ctx(), check_in, "signed.pdf", vec![1, 2, 3])
            .expect("document");
        let report = desk.verify_checklist(&ctx(), check_in).expect("verify");
        assert_eq!(report.status, ChecklistStatus::Verified);
        desk.allocate(&ctx(), id).expect("allocate");
        assert!(desk.registry().assets[&asset].is_bound());

        let check_out = desk
            .open_checklist(&ctx(), id, ChecklistKind::CheckOut)
            .expect("open check-out");
        desk.set_checklist_line(check_out, asset, Some(LineStatus::Damaged), None)
            .expect("line");
        desk.attach_document(&ctx(), check_out, "return.pdf", vec![4])
            .expect("document");
        let report = desk.verify_checklist(&ctx(), check_out).expect("verify");
        assert_eq!(report.status, ChecklistStatus::Escalated);
        assert_eq!(report.follow_ups.len(), 1);
        assert_eq!(desk.registry().assets[&asset].state, AssetState::Damaged);

        desk.return_allocation(&ctx(), id).expect("return");
        assert!(!desk.registry().assets[&asset].is_bound());
        assert_eq!(desk.registry().custody.for_asset(asset).count(), 1);
    }
}
