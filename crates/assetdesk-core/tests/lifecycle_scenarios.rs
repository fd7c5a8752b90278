//! # Lifecycle Scenarios
//!
//! End-to-end flows through the `Desk` facade: allocations with and without
//! approval, camp rooms filling up and emptying, fleet conflicts, scheduled
//! jobs, clearance and persistence.

use assetdesk_core::clearance::ClearanceState;
use assetdesk_core::fleet::{ServiceLog, ServiceState, TripTicket, Vehicle};
use assetdesk_core::maintenance::MaintenancePlan;
use assetdesk_core::notify::NotificationTopic;
use assetdesk_core::{
    ActionContext, AllocationId, AllocationKind, AllocationState, AssetClass, AssetId, AssetState,
    ChecklistKind, ChecklistStatus, Desk, DeskError, EmployeeId, GuardFailure, GuestId,
    HolderInput, LineStatus, NewAsset, Recipients, RecordId, RoomId, SubmitOutcome, UserId,
    VehicleId,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::BTreeSet;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, day, hour, 0, 0)
        .single()
        .expect("timestamp")
}

fn ctx() -> ActionContext {
    ActionContext::new(UserId(1), at(4, 9))
}

fn asset(desk: &mut Desk, name: &str, class: AssetClass, room: Option<RoomId>) -> AssetId {
    let id = desk
        .add_asset(NewAsset {
            name: name.to_string(),
            class,
            cost_cents: 10_000,
            room,
            ..NewAsset::default()
        })
        .expect("asset");
    desk.validate_asset(id).expect("validate");
    id
}

fn verify_with_document(desk: &mut Desk, checklist: assetdesk_core::ChecklistId) -> ChecklistStatus {
    desk.attach_document(&ctx(), checklist, "signed.pdf", b"%PDF".to_vec())
        .expect("document");
    desk.verify_checklist(&ctx(), checklist)
        .expect("verify")
        .status
}

fn camp_room(desk: &mut Desk, capacity: u32) -> RoomId {
    let room = desk
        .add_room("B-204", Some("Block B".to_string()), capacity, None)
        .expect("room");
    asset(desk, "Bed frame", AssetClass::Camp, Some(room));
    asset(desk, "Wardrobe", AssetClass::Camp, Some(room));
    desk.mark_room_done(room).expect("done");
    room
}

fn check_in_employee(desk: &mut Desk, room: RoomId, employee: EmployeeId) -> AllocationId {
    let id = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Room,
            HolderInput {
                room: Some(room),
                employee: Some(employee),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    let checklist = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("check-in");
    assert_eq!(verify_with_document(desk, checklist), ChecklistStatus::Verified);
    desk.allocate(&ctx(), id).expect("allocate");
    id
}

// =============================================================================
// ALLOCATIONS
// =============================================================================

#[test]
fn allocating_without_checklist_names_the_checklist() {
    let mut desk = Desk::new();
    let employee = desk.add_employee("Sara", None, false).expect("employee");
    let a = asset(&mut desk, "Drill", AssetClass::Tool, None);
    let b = asset(&mut desk, "Grinder", AssetClass::Tool, None);
    let id = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Tools,
            HolderInput {
                employee: Some(employee),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    desk.add_allocation_asset(id, a).expect("line");
    desk.add_allocation_asset(id, b).expect("line");

    let err = desk.allocate(&ctx(), id).expect_err("no checklist");
    assert!(matches!(err, DeskError::Guard(GuardFailure::CheckInMissing)));
    assert_eq!(
        err.to_string(),
        "Please check and verify the Check-In Checklist."
    );
    let record = desk.registry().allocation(id).expect("record");
    assert_eq!(record.state(), AllocationState::Draft);
}

#[test]
fn missing_line_escalates_and_marks_asset() {
    let mut desk = Desk::new();
    let employee = desk.add_employee("Ravi", None, false).expect("employee");
    let ok = asset(&mut desk, "Helmet", AssetClass::General, None);
    let lost = asset(&mut desk, "Harness", AssetClass::General, None);
    let id = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Equipment,
            HolderInput {
                employee: Some(employee),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    desk.add_allocation_asset(id, ok).expect("line");
    desk.add_allocation_asset(id, lost).expect("line");
    let checklist = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("open");
    desk.set_checklist_line(checklist, lost, Some(LineStatus::Missing), None)
        .expect("line");

    assert_eq!(
        verify_with_document(&mut desk, checklist),
        ChecklistStatus::Escalated
    );
    assert_eq!(desk.registry().assets[&lost].state, AssetState::Missing);
    assert_eq!(desk.registry().assets[&ok].state, AssetState::Validated);
    assert_eq!(desk.registry().follow_ups.len(), 1);

    desk.reset_checklist(checklist).expect("reset");
    assert_eq!(
        desk.registry().checklist(checklist).expect("checklist").status,
        ChecklistStatus::Pending
    );
}

#[test]
fn expensive_allocation_waits_for_approval() {
    let mut desk = Desk::new();
    desk.set_recipients(Recipients {
        approvers: vec!["it-lead@example.com".to_string()],
        ..Recipients::default()
    })
    .expect("recipients");
    let employee = desk.add_employee("Nora", None, false).expect("employee");
    let laptop = desk
        .add_asset(NewAsset {
            name: "Workstation".to_string(),
            class: AssetClass::It,
            expensive: true,
            cost_cents: 450_000,
            ..NewAsset::default()
        })
        .expect("asset");
    desk.validate_asset(laptop).expect("validate");
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
    desk.add_allocation_asset(id, laptop).expect("line");

    let report = desk.submit(&ctx(), id).expect("submit");
    assert_eq!(report.outcome, SubmitOutcome::AwaitingApproval);
    assert!(matches!(
        desk.allocate(&ctx(), id),
        Err(DeskError::InvalidTransition { .. })
    ));

    desk.approve(&ctx(), id).expect("approve");
    let checklist = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("open");
    verify_with_document(&mut desk, checklist);
    desk.allocate(&ctx(), id).expect("allocate");

    let notifications = desk.drain_outbox().expect("drain");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].topic, NotificationTopic::ApprovalRequired);
}

#[test]
fn bound_asset_cannot_join_another_allocation() {
    let mut desk = Desk::new();
    let first = desk.add_employee("Ali", None, false).expect("employee");
    let second = desk.add_employee("Hana", None, false).expect("employee");
    let drill = asset(&mut desk, "Drill", AssetClass::Tool, None);

    let mut ids = Vec::new();
    for employee in [first, second] {
        let id = desk
            .create_allocation(
                &ctx(),
                AllocationKind::Tools,
                HolderInput {
                    employee: Some(employee),
                    ..HolderInput::default()
                },
            )
            .expect("allocation");
        desk.add_allocation_asset(id, drill).expect("line");
        ids.push(id);
    }
    let checklist = desk
        .open_checklist(&ctx(), ids[0], ChecklistKind::CheckIn)
        .expect("open");
    verify_with_document(&mut desk, checklist);
    desk.allocate(&ctx(), ids[0]).expect("allocate");

    let err = desk
        .open_checklist(&ctx(), ids[1], ChecklistKind::CheckIn)
        .expect_err("bound");
    assert!(err.to_string().starts_with("Asset Drill is already allocated to"));
}

#[test]
fn cancelling_an_allocated_record_frees_assets() {
    let mut desk = Desk::new();
    let employee = desk.add_employee("Joe", None, false).expect("employee");
    let tool = asset(&mut desk, "Saw", AssetClass::Tool, None);
    let id = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Tools,
            HolderInput {
                employee: Some(employee),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    desk.add_allocation_asset(id, tool).expect("line");
    let checklist = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("open");
    verify_with_document(&mut desk, checklist);
    desk.allocate(&ctx(), id).expect("allocate");

    assert_eq!(
        desk.reject(id, "  ").expect_err("reason").to_string(),
        "A rejection reason is required."
    );
    desk.cancel(id).expect("cancel");
    assert!(!desk.registry().assets[&tool].is_bound());
    assert_eq!(
        desk.registry().allocation(id).expect("record").state(),
        AllocationState::Cancelled
    );
}

#[test]
fn removed_asset_leaves_the_check_in_on_reopen() {
    let mut desk = Desk::new();
    let employee = desk.add_employee("Lina", None, false).expect("employee");
    let laptop = asset(&mut desk, "Laptop", AssetClass::It, None);
    let dock = asset(&mut desk, "Dock", AssetClass::It, None);
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
    desk.add_allocation_asset(id, laptop).expect("line");
    desk.add_allocation_asset(id, dock).expect("line");
    let checklist = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("open");

    assert!(desk.remove_allocation_asset(id, dock).expect("remove"));
    let reopened = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("reopen");
    assert_eq!(reopened, checklist);
    let lines = &desk.registry().checklist(checklist).expect("checklist").lines;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].asset, laptop);

    assert_eq!(
        verify_with_document(&mut desk, checklist),
        ChecklistStatus::Verified
    );
    desk.allocate(&ctx(), id).expect("allocate");
    assert!(desk.registry().assets[&laptop].is_bound());
    assert!(!desk.registry().assets[&dock].is_bound());
}

#[test]
fn verified_check_in_resyncs_after_reset() {
    let mut desk = Desk::new();
    let employee = desk.add_employee("Omar", None, false).expect("employee");
    let drill = asset(&mut desk, "Drill", AssetClass::Tool, None);
    let saw = asset(&mut desk, "Saw", AssetClass::Tool, None);
    let id = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Tools,
            HolderInput {
                employee: Some(employee),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    desk.add_allocation_asset(id, drill).expect("line");
    desk.add_allocation_asset(id, saw).expect("line");
    let checklist = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("open");
    verify_with_document(&mut desk, checklist);

    desk.remove_allocation_asset(id, saw).expect("remove");
    assert!(matches!(
        desk.allocate(&ctx(), id),
        Err(DeskError::Guard(GuardFailure::ChecklistMismatch))
    ));

    desk.reset_checklist(checklist).expect("reset");
    desk.open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("reopen");
    assert_eq!(
        desk.registry()
            .checklist(checklist)
            .expect("checklist")
            .asset_ids(),
        BTreeSet::from([drill])
    );
    verify_with_document(&mut desk, checklist);
    desk.allocate(&ctx(), id).expect("allocate");
}

// =============================================================================
// CAMP ROOMS
// =============================================================================

#[test]
fn room_fills_up_and_frees_a_bed() {
    let mut desk = Desk::new();
    let room = camp_room(&mut desk, 4);
    let mut allocations = Vec::new();
    for name in ["A", "B", "C", "D"] {
        let employee = desk.add_employee(name, None, false).expect("employee");
        allocations.push(check_in_employee(&mut desk, room, employee));
    }

    let occupancy = desk.registry().room(room).expect("room").occupancy();
    assert!(occupancy.is_full);
    assert_eq!(occupancy.vacant, 0);

    let late = desk.add_employee("E", None, false).expect("employee");
    let extra = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Room,
            HolderInput {
                room: Some(room),
                employee: Some(late),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    let err = desk
        .open_checklist(&ctx(), extra, ChecklistKind::CheckIn)
        .expect_err("full");
    assert_eq!(
        err.to_string(),
        "Room B-204 is currently full. Please choose another room."
    );

    let leaving = allocations[0];
    let check_out = desk
        .open_checklist(&ctx(), leaving, ChecklistKind::CheckOut)
        .expect("check-out");
    verify_with_document(&mut desk, check_out);
    desk.return_allocation(&ctx(), leaving).expect("return");

    let occupancy = desk.registry().room(room).expect("room").occupancy();
    assert!(!occupancy.is_full);
    assert_eq!(occupancy.vacant, 1);
    // Remaining occupants still hold the room's assets.
    assert!(desk.registry().assets.values().all(|a| a.is_bound()));
}

#[test]
fn guests_and_employees_never_share_a_room() {
    let mut desk = Desk::new();
    let room = camp_room(&mut desk, 3);
    let employee = desk.add_employee("Kofi", None, false).expect("employee");
    check_in_employee(&mut desk, room, employee);

    let guest = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Room,
            HolderInput {
                room: Some(room),
                guest: Some(GuestId(77)),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    let err = desk
        .open_checklist(&ctx(), guest, ChecklistKind::CheckIn)
        .expect_err("mixed");
    assert!(matches!(
        err,
        DeskError::Guard(GuardFailure::RoomHoldsEmployees)
    ));
}

#[test]
fn room_must_be_ready() {
    let mut desk = Desk::new();
    let room = desk.add_room("C-1", None, 2, None).expect("room");
    asset(&mut desk, "Bed", AssetClass::Camp, Some(room));
    let employee = desk.add_employee("Mo", None, false).expect("employee");
    let id = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Room,
            HolderInput {
                room: Some(room),
                employee: Some(employee),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    let err = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect_err("not ready");
    assert_eq!(err.to_string(), "Room C-1 is not ready for assignment.");
}

#[test]
fn room_template_requires_exact_checklist() {
    let mut desk = Desk::new();
    let bed = asset(&mut desk, "Bed", AssetClass::Camp, None);
    let room_type = desk
        .add_room_type("Single", 5_000, BTreeSet::from([bed]))
        .expect("room type");
    let room = desk
        .add_room("D-9", None, 1, Some(room_type))
        .expect("room");
    desk.place_asset(bed, Some(room)).expect("place");
    asset(&mut desk, "Extra chair", AssetClass::Camp, Some(room));
    desk.mark_room_done(room).expect("done");
    let employee = desk.add_employee("Ines", None, false).expect("employee");
    let id = desk
        .create_allocation(
            &ctx(),
            AllocationKind::Room,
            HolderInput {
                room: Some(room),
                employee: Some(employee),
                ..HolderInput::default()
            },
        )
        .expect("allocation");
    let checklist = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckIn)
        .expect("open");
    desk.attach_document(&ctx(), checklist, "signed.pdf", vec![1])
        .expect("document");
    let err = desk.verify_checklist(&ctx(), checklist).expect_err("exact");
    assert_eq!(
        err.to_string(),
        "Checklist does not match expected assets for this room."
    );

    let costs = desk.room_costs(room).expect("costs");
    assert_eq!(costs.additional_cents, 5_000);
}

// =============================================================================
// FLEET, JOBS AND CLEARANCE
// =============================================================================

fn vehicle(desk: &mut Desk, license_expiry: Option<NaiveDate>) -> VehicleId {
    desk.add_vehicle(Vehicle {
        id: VehicleId(0),
        name: "Hilux".to_string(),
        license_plate: Some("DXB 4411".to_string()),
        license_expiry,
        insurance_expiry: None,
    })
    .expect("vehicle")
}

#[test]
fn trip_ticket_during_service_is_a_conflict() {
    let mut desk = Desk::new();
    let car = vehicle(&mut desk, None);
    desk.add_service_log(ServiceLog {
        id: RecordId(0),
        vehicle: car,
        service_type: "Oil change".to_string(),
        state: ServiceState::Running,
        start: Some(at(10, 8)),
        end: Some(at(10, 12)),
    })
    .expect("service");

    let err = desk
        .add_trip_ticket(TripTicket {
            id: RecordId(0),
            name: "Site visit".to_string(),
            vehicle: car,
            driver: None,
            start: Some(at(10, 12)),
            end: Some(at(10, 18)),
            odometer_start: None,
            odometer_end: None,
        })
        .expect_err("conflict");
    assert!(matches!(err, DeskError::Conflict(_)));
    assert!(err.to_string().contains("The vehicle is in Service:"));
    assert!(desk.registry().fleet.tickets.is_empty());
}

#[test]
fn expiry_alerts_fire_on_exact_days() {
    let mut desk = Desk::new();
    desk.set_recipients(Recipients {
        fleet: vec!["fleet@example.com".to_string()],
        ..Recipients::default()
    })
    .expect("recipients");
    let today = ctx().today();
    vehicle(&mut desk, Some(today + Duration::days(30)));
    vehicle(&mut desk, Some(today + Duration::days(29)));

    let report = desk.run_daily_jobs(&ctx()).expect("jobs");
    assert_eq!(report.expiry_alerts, 1);
    let sent = desk.drain_outbox().expect("drain");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Fleet Alert: Vehicle License Expiry for Hilux");
}

#[test]
fn maintenance_plan_opens_preventive_request() {
    let mut desk = Desk::new();
    let pump = asset(&mut desk, "Pump", AssetClass::General, None);
    let due = NaiveDate::from_ymd_opt(2026, 5, 1).expect("date");
    desk.set_maintenance_plan(MaintenancePlan {
        asset: pump,
        period_days: 30,
        next_action_date: Some(due),
    })
    .expect("plan");

    let opened = desk.run_maintenance_recurrence().expect("job");
    assert_eq!(opened.len(), 1);
    let request = &desk.registry().maintenance.requests[&opened[0]];
    assert_eq!(request.request_date, due + Duration::days(30));
    assert_eq!(request.reference, "MRQ/00001");
}

#[test]
fn clearance_deducts_damaged_room_assets() {
    let mut desk = Desk::new();
    let room = camp_room(&mut desk, 1);
    let employee = desk.add_employee("Tariq", None, false).expect("employee");
    let id = check_in_employee(&mut desk, room, employee);

    let check_out = desk
        .open_checklist(&ctx(), id, ChecklistKind::CheckOut)
        .expect("check-out");
    let damaged = desk
        .registry()
        .room(room)
        .expect("room")
        .assets
        .first()
        .copied()
        .expect("asset");
    desk.set_checklist_line(check_out, damaged, Some(LineStatus::Damaged), None)
        .expect("line");
    verify_with_document(&mut desk, check_out);
    desk.return_allocation(&ctx(), id).expect("return");

    let clearance = desk.create_clearance(&ctx(), employee, room).expect("clearance");
    desk.process_clearance(clearance, check_out).expect("process");
    let request = &desk.registry().clearances[&clearance];
    assert_eq!(request.state, ClearanceState::Deducted);
    assert_eq!(request.total_cents(), 10_000);
}

// =============================================================================
// PERSISTENCE
// =============================================================================

#[test]
fn redb_desk_survives_restart_and_skips_failed_commits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("assetdesk.redb");
    let (employee, drill) = {
        let mut desk = Desk::with_redb(&path).expect("open");
        assert!(desk.is_persistent());
        let employee = desk.add_employee("Zed", None, false).expect("employee");
        let drill = asset(&mut desk, "Drill", AssetClass::Tool, None);
        assert!(desk.add_employee("   ", None, false).is_err());
        (employee, drill)
    };

    let desk = Desk::with_redb(&path).expect("reopen");
    assert_eq!(desk.registry().employees.len(), 1);
    assert!(desk.registry().employee(employee).is_ok());
    assert_eq!(desk.registry().assets[&drill].state, AssetState::Validated);
}

#[test]
fn snapshot_export_import_round_trip() {
    let mut desk = Desk::new();
    let room = camp_room(&mut desk, 2);
    let employee = desk.add_employee("Ann", None, false).expect("employee");
    check_in_employee(&mut desk, room, employee);

    let bytes = desk.export_bytes().expect("export");
    let mut restored = Desk::new();
    restored.import_bytes(&bytes).expect("import");
    assert_eq!(restored.registry(), desk.registry());
    assert!(restored.import_bytes(b"garbage!!").is_err());
    assert_eq!(restored.registry(), desk.registry());
}
