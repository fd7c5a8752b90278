//! # Reference Sequences
//!
//! Per-kind counters that hand out human-readable references such as
//! `ITA/00042`. The sequencer lives inside the registry, so references are
//! persisted and rolled back together with the records that use them.

use crate::allocation::AllocationKind;
use crate::checklist::ChecklistKind;
use crate::primitives::REFERENCE_DIGITS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every numbered record family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceCode {
    EquipmentAllocation,
    ItAllocation,
    ToolsAllocation,
    RoomAllocation,
    CheckIn,
    CheckOut,
    FollowUp,
    Ticket,
    Clearance,
    Maintenance,
    JobCard,
}

impl SequenceCode {
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::EquipmentAllocation => "EQA/",
            Self::ItAllocation => "ITA/",
            Self::ToolsAllocation => "TLA/",
            Self::RoomAllocation => "CRA/",
            Self::CheckIn => "CKI/",
            Self::CheckOut => "CKO/",
            Self::FollowUp => "PRQ/",
            Self::Ticket => "TKT/",
            Self::Clearance => "CLR/",
            Self::Maintenance => "MRQ/",
            Self::JobCard => "JOB/",
        }
    }
}

impl From<AllocationKind> for SequenceCode {
    fn from(kind: AllocationKind) -> Self {
        match kind {
            AllocationKind::Equipment => Self::EquipmentAllocation,
            AllocationKind::It => Self::ItAllocation,
            AllocationKind::Tools => Self::ToolsAllocation,
            AllocationKind::Room => Self::RoomAllocation,
        }
    }
}

impl From<ChecklistKind> for SequenceCode {
    fn from(kind: ChecklistKind) -> Self {
        match kind {
            ChecklistKind::CheckIn => Self::CheckIn,
            ChecklistKind::CheckOut => Self::CheckOut,
        }
    }
}

/// Monotonic counters, one per code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequencer {
    counters: BTreeMap<SequenceCode, u64>,
}

impl Sequencer {
    /// Advance the counter for `code` and format the reference.
    pub fn next(&mut self, code: SequenceCode) -> String {
        let counter = self.counters.entry(code).or_insert(0);
        *counter = counter.saturating_add(1);
        format!("{}{:0width$}", code.prefix(), counter, width = REFERENCE_DIGITS)
    }

    /// Last number issued for `code` (0 when none).
    #[must_use]
    pub fn current(&self, code: SequenceCode) -> u64 {
        self.counters.get(&code).copied().unwrap_or(0)
    }
}
