//! # assetdesk-core
//!
//! The rules of the asset desk.
//!
//! This crate owns every state machine of the system: asset allocations
//! with their approval path, check-in and check-out checklists, camp room
//! occupancy, fleet scheduling conflicts, maintenance recurrence and exit
//! clearance. The service binary (`apps/assetdesk`) only drives it.
//!
//! ## Architectural Constraints
//!
//! - No async, no network, no logging: failures come back as [`DeskError`]
//! - Deterministic: `BTreeMap`/`BTreeSet` only, integer money (cents)
//! - Time is always passed in through [`ActionContext`]
//! - Every multi-record transition runs atomically through [`Desk`]

// =============================================================================
// MODULES
// =============================================================================

pub mod allocation;
pub mod asset;
pub mod checklist;
pub mod clearance;
pub mod custody;
pub mod desk;
pub mod fleet;
pub mod formats;
pub mod holder;
pub mod maintenance;
pub mod notify;
pub mod overlap;
pub mod primitives;
pub mod registry;
pub mod room;
pub mod sequence;
pub mod storage;
pub mod system;
pub mod ticket;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ActionContext, AllocationId, AssetId, ChecklistId, DeskError, EmployeeId, GuardFailure,
    GuestId, PartnerId, ProjectId, RecordId, RoomId, RoomTypeId, UserId, VehicleId, check_text,
    require_name,
};

// =============================================================================
// RE-EXPORTS: Domain
// =============================================================================

pub use allocation::{Allocation, AllocationKind, AllocationState, AssetLine, SubmitOutcome};
pub use asset::{Asset, AssetClass, AssetLedger, AssetState, HolderRef};
pub use checklist::{Checklist, ChecklistKind, ChecklistStatus, LineStatus, SourceMatch};
pub use desk::{Desk, HolderInput, JobReport, NewAsset, StorageBackend, SubmitReport, VerifyReport};
pub use holder::{Assignee, Custodian, Holder, Occupant, RoomOccupancy};
pub use notify::{Notification, NotificationTopic};
pub use registry::{AllocationRecord, Employee, Recipients, Registry};
pub use room::{Room, RoomType};
pub use storage::RedbRegistry;

// =============================================================================
// RE-EXPORTS: Formats and System
// =============================================================================

pub use formats::{SnapshotHeader, registry_from_bytes, registry_to_bytes};
pub use system::DeskMetrics;
