//! # Asset Register
//!
//! Physical assets, their lifecycle status and their current binding.
//!
//! An asset is *bound* while some holder has custody of it. Room bindings
//! are shared: every occupant of a room holds the room's assets, so the
//! binding keeps a hold count and clears only when the last hold is released.

use crate::primitives::MAX_NAME_LENGTH;
use crate::{AssetId, DeskError, EmployeeId, ProjectId, RoomId, require_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ASSET STATE
// =============================================================================

/// Lifecycle status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Draft,
    Validated,
    Scrap,
    Damaged,
    Missing,
}

impl AssetState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validated => "validated",
            Self::Scrap => "scrap",
            Self::Damaged => "damaged",
            Self::Missing => "missing",
        }
    }
}

/// Register an asset belongs to; decides which allocation kind can take it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    #[default]
    General,
    It,
    Tool,
    Camp,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [Self::General, Self::It, Self::Tool, Self::Camp];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::It => "it",
            Self::Tool => "tool",
            Self::Camp => "camp",
        }
    }
}

// =============================================================================
// BINDING
// =============================================================================

/// Who currently has custody of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderRef {
    Employee {
        employee: EmployeeId,
        project: Option<ProjectId>,
    },
    Project {
        project: ProjectId,
    },
    Room {
        room: RoomId,
    },
}

impl std::fmt::Display for HolderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Employee {
                employee,
                project: Some(project),
            } => write!(f, "employee {} (project {})", employee, project),
            Self::Employee {
                employee,
                project: None,
            } => write!(f, "employee {}", employee),
            Self::Project { project } => write!(f, "project {}", project),
            Self::Room { room } => write!(f, "room {}", room),
        }
    }
}

/// Current custody of an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub holder: Option<HolderRef>,
    /// Number of open holds on the binding (more than one only for rooms).
    pub holds: u32,
}

// =============================================================================
// ASSET
// =============================================================================

/// A physical asset in the register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub tag: Option<String>,
    pub serial: Option<String>,
    pub class: AssetClass,
    pub state: AssetState,
    /// High-value assets require approval before allocation.
    pub expensive: bool,
    pub cost_cents: i64,
    /// Physical placement (a camp room), independent of custody.
    pub room: Option<RoomId>,
    pub binding: Binding,
}

impl Asset {
    /// Create a draft asset.
    pub fn new(id: AssetId, name: &str) -> Result<Self, DeskError> {
        Ok(Self {
            id,
            name: require_name("Name", name)?,
            tag: None,
            serial: None,
            class: AssetClass::General,
            state: AssetState::Draft,
            expensive: false,
            cost_cents: 0,
            room: None,
            binding: Binding::default(),
        })
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.holder.is_some()
    }

    /// Move the asset into service. Repaired or recovered assets come back
    /// through this transition as well.
    pub fn validate(&mut self) -> Result<(), DeskError> {
        match self.state {
            AssetState::Draft | AssetState::Damaged | AssetState::Missing => {
                self.state = AssetState::Validated;
                Ok(())
            }
            other => Err(DeskError::InvalidTransition {
                action: "validate",
                state: other.name(),
            }),
        }
    }

    /// Retire the asset. Assets in custody cannot be scrapped.
    pub fn scrap(&mut self) -> Result<(), DeskError> {
        if self.is_bound() {
            return Err(DeskError::Validation(
                "You cannot scrap an allocated asset.".to_string(),
            ));
        }
        if self.state == AssetState::Scrap {
            return Err(DeskError::InvalidTransition {
                action: "scrap",
                state: self.state.name(),
            });
        }
        self.state = AssetState::Scrap;
        Ok(())
    }

    /// Add one hold for `holder`.
    ///
    /// Callers check compatibility first; a different holder replaces the
    /// previous one and restarts the count.
    pub fn bind(&mut self, holder: HolderRef) {
        if self.binding.holder == Some(holder) {
            self.binding.holds = self.binding.holds.saturating_add(1);
        } else {
            self.binding = Binding {
                holder: Some(holder),
                holds: 1,
            };
        }
    }

    /// Release one hold for `holder`. Returns true when the asset became free.
    pub fn release(&mut self, holder: &HolderRef) -> bool {
        if self.binding.holder.as_ref() != Some(holder) {
            return false;
        }
        self.binding.holds = self.binding.holds.saturating_sub(1);
        if self.binding.holds == 0 {
            self.binding.holder = None;
            return true;
        }
        false
    }
}

/// Validate an asset tag: unique elsewhere, and free of whitespace.
pub fn validate_tag(tag: &str) -> Result<String, DeskError> {
    let tag = tag.trim();
    if tag.is_empty() || tag.len() > MAX_NAME_LENGTH {
        return Err(DeskError::Validation(
            "The Asset Tag must be between 1 and 256 characters.".to_string(),
        ));
    }
    if tag.chars().any(char::is_whitespace) {
        return Err(DeskError::Validation(
            "The Asset Tag must not contain spaces.".to_string(),
        ));
    }
    Ok(tag.to_string())
}

// =============================================================================
// ASSET LEDGER
// =============================================================================

/// Read/write access to the asset register.
///
/// Transitions only touch assets through this trait, so they run unchanged
/// against the full registry or a bare map in tests.
pub trait AssetLedger {
    fn asset(&self, id: AssetId) -> Option<&Asset>;
    fn asset_mut(&mut self, id: AssetId) -> Option<&mut Asset>;
}

impl AssetLedger for BTreeMap<AssetId, Asset> {
    fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.get(&id)
    }

    fn asset_mut(&mut self, id: AssetId) -> Option<&mut Asset> {
        self.get_mut(&id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
