//! # Checklists
//!
//! Check-in and check-out verification records.
//!
//! A checklist starts `Pending`. Verification needs a signed document and a
//! condition on every line; any missing or damaged line escalates the
//! checklist and propagates the condition onto the asset itself. `reset`
//! always returns the checklist to `Pending`.

use crate::allocation::AssetLine;
use crate::asset::{AssetLedger, AssetState, HolderRef};
use crate::primitives::{MAX_DOCUMENT_SIZE, MAX_TEXT_LENGTH};
use crate::{
    ActionContext, AllocationId, AssetId, ChecklistId, DeskError, RoomId, UserId, require_name,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CHECKLIST ENUMS
// =============================================================================

/// Which custody event the checklist covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistKind {
    CheckIn,
    CheckOut,
}

impl std::fmt::Display for ChecklistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CheckIn => write!(f, "Check-In"),
            Self::CheckOut => write!(f, "Check-Out"),
        }
    }
}

/// Observed condition of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Ok,
    Missing,
    Damaged,
}

impl LineStatus {
    #[must_use]
    pub fn is_issue(&self) -> bool {
        matches!(self, Self::Missing | Self::Damaged)
    }

    /// The asset status an issue propagates to.
    #[must_use]
    pub fn asset_state(&self) -> Option<AssetState> {
        match self {
            Self::Ok => None,
            Self::Missing => Some(AssetState::Missing),
            Self::Damaged => Some(AssetState::Damaged),
        }
    }
}

/// Overall checklist status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Pending,
    Verified,
    Escalated,
}

impl ChecklistStatus {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Escalated => "escalated",
        }
    }
}

/// How the checklist's assets are compared with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMatch {
    /// Every expected asset must be on the checklist; extra lines are fine.
    Superset,
    /// The checklist must list exactly the expected assets.
    Exact,
}

// =============================================================================
// CHECKLIST RECORD
// =============================================================================

/// One asset's observed condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistLine {
    pub asset: AssetId,
    pub serial: Option<String>,
    pub cost_cents: i64,
    pub status: Option<LineStatus>,
    pub remarks: Option<String>,
}

impl From<&AssetLine> for ChecklistLine {
    fn from(line: &AssetLine) -> Self {
        Self {
            asset: line.asset,
            serial: line.serial.clone(),
            cost_cents: line.cost_cents,
            status: Some(LineStatus::Ok),
            remarks: None,
        }
    }
}

/// Metadata and content of the uploaded signed checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDocument {
    pub filename: String,
    pub content: Vec<u8>,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

/// A line whose issue was propagated during verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedLine {
    pub asset: AssetId,
    pub status: LineStatus,
}

/// Verification record for a check-in or check-out event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: ChecklistId,
    pub reference: String,
    pub kind: ChecklistKind,
    pub allocation: AllocationId,
    pub holder: HolderRef,
    pub room: Option<RoomId>,
    pub lines: Vec<ChecklistLine>,
    pub status: ChecklistStatus,
    pub document: Option<SignedDocument>,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Checklist {
    /// Open a pending checklist with one `Ok` line per allocation line.
    #[must_use]
    pub fn open(
        id: ChecklistId,
        reference: String,
        kind: ChecklistKind,
        allocation: AllocationId,
        holder: HolderRef,
        lines: &[AssetLine],
        now: DateTime<Utc>,
    ) -> Self {
        let room = match holder {
            HolderRef::Room { room } => Some(room),
            _ => None,
        };
        Self {
            id,
            reference,
            kind,
            allocation,
            holder,
            room,
            lines: lines.iter().map(ChecklistLine::from).collect(),
            status: ChecklistStatus::Pending,
            document: None,
            verified_by: None,
            verified_at: None,
            created_at: now,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ChecklistStatus::Pending
    }

    /// Asset ids on the checklist, with multiplicity.
    #[must_use]
    pub fn asset_counts(&self) -> BTreeMap<AssetId, usize> {
        let mut counts = BTreeMap::new();
        for line in &self.lines {
            *counts.entry(line.asset).or_insert(0usize) += 1;
        }
        counts
    }

    /// Distinct asset ids on the checklist.
    #[must_use]
    pub fn asset_ids(&self) -> BTreeSet<AssetId> {
        self.lines.iter().map(|l| l.asset).collect()
    }

    fn ensure_pending(&self, action: &'static str) -> Result<(), DeskError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(DeskError::InvalidTransition {
                action,
                state: self.status.name(),
            })
        }
    }

    /// Bring the lines in line with the allocation: drop lines for assets
    /// it no longer holds and append the ones not covered yet. Lines that
    /// stay keep their recorded status. Returns `(added, removed)`.
    pub fn sync(&mut self, lines: &[AssetLine]) -> Result<(usize, usize), DeskError> {
        self.ensure_pending("update")?;
        let wanted: BTreeSet<AssetId> = lines.iter().map(|l| l.asset).collect();
        let before = self.lines.len();
        self.lines.retain(|l| wanted.contains(&l.asset));
        let removed = before - self.lines.len();

        let present = self.asset_ids();
        let kept = self.lines.len();
        self.lines.extend(
            lines
                .iter()
                .filter(|l| !present.contains(&l.asset))
                .map(ChecklistLine::from),
        );
        Ok((self.lines.len() - kept, removed))
    }

    /// Record the observed condition of one asset.
    pub fn set_line_status(
        &mut self,
        asset: AssetId,
        status: Option<LineStatus>,
        remarks: Option<String>,
    ) -> Result<(), DeskError> {
        self.ensure_pending("update")?;
        if let Some(r) = &remarks {
            if r.len() > MAX_TEXT_LENGTH {
                return Err(DeskError::Validation(format!(
                    "Remarks exceed {} bytes",
                    MAX_TEXT_LENGTH
                )));
            }
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.asset == asset)
            .ok_or_else(|| DeskError::not_found("Checklist line for asset", asset.0))?;
        line.status = status;
        line.remarks = remarks;
        Ok(())
    }

    /// Attach the signed checklist scan.
    pub fn attach_document(
        &mut self,
        ctx: &ActionContext,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<(), DeskError> {
        self.ensure_pending("attach a document to")?;
        let filename = require_name("Filename", filename)?;
        if content.is_empty() {
            return Err(DeskError::Validation(
                "Signed checklist must not be empty.".to_string(),
            ));
        }
        if content.len() > MAX_DOCUMENT_SIZE {
            return Err(DeskError::Validation(format!(
                "Signed checklist exceeds {} bytes",
                MAX_DOCUMENT_SIZE
            )));
        }
        self.document = Some(SignedDocument {
            filename,
            content,
            uploaded_by: ctx.actor,
            uploaded_at: ctx.now,
        });
        Ok(())
    }

    /// Compare the checklist's assets with the assets it is meant to cover.
    pub fn validate_against(
        &self,
        expected: &BTreeSet<AssetId>,
        mode: SourceMatch,
    ) -> Result<(), DeskError> {
        let present = self.asset_ids();
        match mode {
            SourceMatch::Superset => {
                let missing: Vec<String> = expected
                    .difference(&present)
                    .map(|a| a.to_string())
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(DeskError::Validation(format!(
                        "Checklist is missing some allocated assets: {}.",
                        missing.join(", ")
                    )))
                }
            }
            SourceMatch::Exact => {
                if &present == expected {
                    Ok(())
                } else {
                    Err(DeskError::Validation(
                        "Checklist does not match expected assets for this room.".to_string(),
                    ))
                }
            }
        }
    }

    /// Verify the checklist.
    ///
    /// Every precondition is checked before anything changes. On success the
    /// status is `Escalated` when any line reports an issue (and each such
    /// asset takes the reported condition) or `Verified` otherwise.
    pub fn verify<L: AssetLedger + ?Sized>(
        &mut self,
        ctx: &ActionContext,
        ledger: &mut L,
        expected: &BTreeSet<AssetId>,
        mode: SourceMatch,
    ) -> Result<Vec<FlaggedLine>, DeskError> {
        self.ensure_pending("verify")?;

        if self.document.as_ref().is_none_or(|d| d.content.is_empty()) {
            return Err(DeskError::Validation(
                "Signed checklist must be uploaded before verification.".to_string(),
            ));
        }

        let mut flagged = Vec::new();
        for line in &self.lines {
            let status = line.status.ok_or_else(|| {
                DeskError::Validation("All checklist lines must have a status.".to_string())
            })?;
            if status.is_issue() {
                flagged.push(FlaggedLine {
                    asset: line.asset,
                    status,
                });
            }
        }

        self.validate_against(expected, mode)?;

        if let Some(unknown) = flagged.iter().find(|f| ledger.asset(f.asset).is_none()) {
            return Err(DeskError::not_found("Asset", unknown.asset.0));
        }

        // All checks passed: mutate.
        for line in &flagged {
            if let (Some(asset), Some(state)) =
                (ledger.asset_mut(line.asset), line.status.asset_state())
            {
                asset.state = state;
            }
        }
        self.status = if flagged.is_empty() {
            ChecklistStatus::Verified
        } else {
            ChecklistStatus::Escalated
        };
        self.verified_by = Some(ctx.actor);
        self.verified_at = Some(ctx.now);

        Ok(flagged)
    }

    /// Return to `Pending` and clear the verifier, from any status.
    pub fn reset(&mut self) {
        self.status = ChecklistStatus::Pending;
        self.verified_by = None;
        self.verified_at = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================
