//! # API Request/Response Types
//!
//! JSON bodies of the HTTP API. Core records (`Asset`, `Checklist`, ...)
//! are returned as they are; the types here cover inputs and envelopes.

use assetdesk_core::fleet::{
    AssignmentStatus, DriverAssignment, JobCard, JobCardState, ServiceLog, ServiceState, Trip,
    TripTicket, Vehicle,
};
use assetdesk_core::maintenance::{MaintenanceKind, RequestState};
use assetdesk_core::room::{Occupancy, RoomCosts};
use assetdesk_core::{
    AllocationKind, AllocationRecord, AllocationState, AssetId, AssetLine, ChecklistId,
    ChecklistKind, DeskError, EmployeeId, HolderInput, HolderRef, LineStatus, ProjectId, RecordId,
    Room, RoomId, RoomTypeId, VehicleId,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// ENVELOPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body of every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable class: `guard`, `validation`, `not_found`,
    /// `invalid_transition`, `conflict` or `internal`.
    pub kind: String,
    pub error: String,
}

impl ErrorResponse {
    /// Storage and codec failures are reported without detail.
    pub fn from_error(error: &DeskError) -> Self {
        let kind = match error {
            DeskError::Guard(_) => "guard",
            DeskError::Validation(_) => "validation",
            DeskError::NotFound { .. } => "not_found",
            DeskError::InvalidTransition { .. } => "invalid_transition",
            DeskError::Conflict(_) => "conflict",
            DeskError::SerializationError(_)
            | DeskError::DeserializationError(_)
            | DeskError::IoError(_) => "internal",
        };
        let error = if error.is_user_facing() {
            error.to_string()
        } else {
            "Internal storage error".to_string()
        };
        Self {
            kind: kind.to_string(),
            error,
        }
    }
}

/// Id of a newly created record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: u64,
}

impl IdResponse {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

/// Registry snapshot, base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub data: String,
    pub bytes: usize,
}

impl ExportResponse {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            bytes: bytes.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub data: String,
}

impl ImportRequest {
    pub fn decode(&self) -> Result<Vec<u8>, DeskError> {
        decode_base64("Snapshot", &self.data)
    }
}

fn decode_base64(field: &str, data: &str) -> Result<Vec<u8>, DeskError> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| DeskError::Validation(format!("{} is not valid base64: {}", field, e)))
}

// =============================================================================
// MASTER DATA
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceAssetRequest {
    #[serde(default)]
    pub room: Option<RoomId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmployeeRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_driver: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoomTypeRequest {
    pub name: String,
    #[serde(default)]
    pub additional_cost_cents: i64,
    /// Assets every room of this type must hold.
    #[serde(default)]
    pub template: BTreeSet<AssetId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoomRequest {
    pub name: String,
    #[serde(default)]
    pub block: Option<String>,
    pub capacity: u32,
    #[serde(default)]
    pub room_type: Option<RoomTypeId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapacityRequest {
    pub capacity: u32,
}

/// A room with its derived figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    pub room: Room,
    pub occupancy: Occupancy,
    pub costs: RoomCosts,
}

// =============================================================================
// ALLOCATIONS AND CHECKLISTS
// =============================================================================

/// `{"kind": "it", "employee": 4}`; holder fields depend on the kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAllocationRequest {
    pub kind: AllocationKind,
    #[serde(flatten)]
    pub holder: HolderInput,
}

/// Flat view of an allocation of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationView {
    pub id: u64,
    pub reference: String,
    pub kind: AllocationKind,
    pub state: AllocationState,
    pub holder: HolderRef,
    pub holder_label: String,
    pub lines: Vec<AssetLine>,
    pub check_in: Option<ChecklistId>,
    pub check_out: Option<ChecklistId>,
    pub rejection_reason: Option<String>,
}

impl From<&AllocationRecord> for AllocationView {
    fn from(record: &AllocationRecord) -> Self {
        Self {
            id: record.id().0,
            reference: record.reference().to_string(),
            kind: record.kind(),
            state: record.state(),
            holder: record.holder_ref(),
            holder_label: record.holder_label(),
            lines: record.lines().to_vec(),
            check_in: record.check_in(),
            check_out: record.check_out(),
            rejection_reason: record.rejection_reason().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AllocationAssetRequest {
    pub asset: AssetId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OpenChecklistRequest {
    pub kind: ChecklistKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistLineRequest {
    pub asset: AssetId,
    #[serde(default)]
    pub status: Option<LineStatus>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// A signed checklist scan, base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub filename: String,
    pub content: String,
}

impl DocumentRequest {
    pub fn decode(&self) -> Result<Vec<u8>, DeskError> {
        decode_base64("Document", &self.content)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreateClearanceRequest {
    pub employee: EmployeeId,
    pub room: RoomId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProcessClearanceRequest {
    pub checklist: ChecklistId,
}

// =============================================================================
// FLEET
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRequest {
    pub name: String,
    #[serde(default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub license_expiry: Option<NaiveDate>,
    #[serde(default)]
    pub insurance_expiry: Option<NaiveDate>,
}

impl VehicleRequest {
    /// The desk assigns the id.
    pub fn into_vehicle(self) -> Vehicle {
        Vehicle {
            id: VehicleId(0),
            name: self.name,
            license_plate: self.license_plate,
            license_expiry: self.license_expiry,
            insurance_expiry: self.insurance_expiry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub vehicle: VehicleId,
    pub service_type: String,
    #[serde(default)]
    pub state: Option<ServiceState>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn into_service(self) -> ServiceLog {
        ServiceLog {
            id: RecordId(0),
            vehicle: self.vehicle,
            service_type: self.service_type,
            state: self.state.unwrap_or(ServiceState::Running),
            start: self.start,
            end: self.end,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServiceStateRequest {
    pub state: ServiceState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    #[serde(default)]
    pub reference: String,
    pub vehicle: VehicleId,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl TripRequest {
    pub fn into_trip(self) -> Trip {
        Trip {
            id: RecordId(0),
            reference: self.reference,
            vehicle: self.vehicle,
            start: self.start,
            end: self.end,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripTicketRequest {
    pub name: String,
    pub vehicle: VehicleId,
    #[serde(default)]
    pub driver: Option<EmployeeId>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub odometer_start: Option<u64>,
    #[serde(default)]
    pub odometer_end: Option<u64>,
}

impl TripTicketRequest {
    pub fn into_ticket(self) -> TripTicket {
        TripTicket {
            id: RecordId(0),
            name: self.name,
            vehicle: self.vehicle,
            driver: self.driver,
            start: self.start,
            end: self.end,
            odometer_start: self.odometer_start,
            odometer_end: self.odometer_end,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAssignmentRequest {
    pub driver: EmployeeId,
    pub vehicle: VehicleId,
    #[serde(default)]
    pub project: Option<ProjectId>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
}

impl DriverAssignmentRequest {
    pub fn into_assignment(self) -> DriverAssignment {
        DriverAssignment {
            id: RecordId(0),
            driver: self.driver,
            vehicle: self.vehicle,
            project: self.project,
            start: self.start,
            end: self.end,
            status: self.status.unwrap_or(AssignmentStatus::Draft),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AssignmentStatusRequest {
    pub status: AssignmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCardRequest {
    pub vehicle: VehicleId,
    #[serde(default)]
    pub time_in: Option<DateTime<Utc>>,
}

impl JobCardRequest {
    /// Reference and state are set by the desk.
    pub fn into_card(self) -> JobCard {
        JobCard {
            id: RecordId(0),
            reference: String::new(),
            vehicle: self.vehicle,
            time_in: self.time_in,
            time_out: None,
            state: JobCardState::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CloseJobCardRequest {
    #[serde(default)]
    pub time_out: Option<DateTime<Utc>>,
}

// =============================================================================
// MAINTENANCE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRequestBody {
    pub asset: AssetId,
    pub kind: MaintenanceKind,
    /// Defaults to today.
    #[serde(default)]
    pub request_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaintenanceStateRequest {
    pub state: RequestState,
}
