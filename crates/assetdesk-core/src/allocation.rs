//! # Allocation Workflow
//!
//! One generic lifecycle shared by every allocation kind (general equipment,
//! IT assets, tools, camp rooms). The kinds differ only in their holder type
//! and in the extra guards they plug into `allocate`.
//!
//! ## States
//!
//! ```text
//! draft ──submit──► submitted ───────────────┐
//!   │                                        ▼
//!   └──submit (expensive)──► pending ──approve──► approved ──allocate──► allocated ──return──► returned
//!
//! cancel / reject: any non-terminal state ──► cancelled / rejected
//! ```
//!
//! `allocate` is accepted from `draft`, `submitted` and `approved`.
//!
//! ## Atomicity
//!
//! Every guard runs before the first mutation. A failed transition leaves
//! the allocation and every asset exactly as they were.

use crate::asset::{Asset, AssetLedger, AssetState};
use crate::checklist::Checklist;
use crate::holder::Holder;
use crate::primitives::{MAX_ALLOCATION_LINES, MAX_TEXT_LENGTH};
use crate::{ActionContext, AllocationId, AssetId, DeskError, GuardFailure, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// KIND AND STATE
// =============================================================================

/// The four allocation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationKind {
    Equipment,
    It,
    Tools,
    Room,
}

impl AllocationKind {
    pub const ALL: [AllocationKind; 4] = [Self::Equipment, Self::It, Self::Tools, Self::Room];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equipment => "equipment",
            Self::It => "it",
            Self::Tools => "tools",
            Self::Room => "room",
        }
    }
}

/// Lifecycle state of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationState {
    Draft,
    /// Submitted without needing approval.
    Submitted,
    /// Waiting for an approver.
    Pending,
    Approved,
    Allocated,
    Returned,
    Cancelled,
    Rejected,
}

impl AllocationState {
    pub const ALL: [AllocationState; 8] = [
        Self::Draft,
        Self::Submitted,
        Self::Pending,
        Self::Approved,
        Self::Allocated,
        Self::Returned,
        Self::Cancelled,
        Self::Rejected,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Allocated => "allocated",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Returned | Self::Cancelled | Self::Rejected)
    }

    #[must_use]
    pub fn can_allocate(&self) -> bool {
        matches!(self, Self::Draft | Self::Submitted | Self::Approved)
    }
}

// =============================================================================
// ASSET LINES
// =============================================================================

/// One asset attached to an allocation, with its identity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLine {
    pub asset: AssetId,
    pub serial: Option<String>,
    pub tag: Option<String>,
    pub cost_cents: i64,
}

impl AssetLine {
    #[must_use]
    pub fn snapshot(asset: &Asset) -> Self {
        Self {
            asset: asset.id,
            serial: asset.serial.clone(),
            tag: asset.tag.clone(),
            cost_cents: asset.cost_cents,
        }
    }
}

// =============================================================================
// PLUGGABLE GUARDS
// =============================================================================

/// A kind-specific precondition checked by `allocate` and check-in opening.
pub trait AllocationGuard<H> {
    fn check(&self, allocation: &Allocation<H>) -> Result<(), GuardFailure>;
}

/// Result of `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitOutcome {
    /// At least one asset is expensive; approvers must be notified.
    AwaitingApproval,
    /// Eligible for allocation straight away.
    Ready,
}

// =============================================================================
// ALLOCATION
// =============================================================================

/// A request to bind assets to a holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation<H> {
    pub id: AllocationId,
    pub reference: String,
    pub kind: AllocationKind,
    pub holder: H,
    pub lines: Vec<AssetLine>,
    pub state: AllocationState,
    pub check_in: Option<crate::ChecklistId>,
    pub check_out: Option<crate::ChecklistId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub allocated_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl<H: Holder> Allocation<H> {
    /// Create a draft allocation with no lines.
    #[must_use]
    pub fn new(
        id: AllocationId,
        reference: String,
        kind: AllocationKind,
        holder: H,
        ctx: &ActionContext,
    ) -> Self {
        Self {
            id,
            reference,
            kind,
            holder,
            lines: Vec::new(),
            state: AllocationState::Draft,
            check_in: None,
            check_out: None,
            created_by: ctx.actor,
            created_at: ctx.now,
            approved_by: None,
            approved_at: None,
            allocated_at: None,
            returned_at: None,
            rejection_reason: None,
        }
    }

    fn transition_error(&self, action: &'static str) -> DeskError {
        DeskError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }

    /// Asset ids on the allocation, with multiplicity.
    #[must_use]
    pub fn asset_counts(&self) -> BTreeMap<AssetId, usize> {
        let mut counts = BTreeMap::new();
        for line in &self.lines {
            *counts.entry(line.asset).or_insert(0usize) += 1;
        }
        counts
    }

    /// Distinct asset ids on the allocation.
    #[must_use]
    pub fn asset_ids(&self) -> BTreeSet<AssetId> {
        self.lines.iter().map(|l| l.asset).collect()
    }

    /// Attach an asset. Only drafts can be edited, and an asset appears once.
    pub fn add_asset(&mut self, asset: &Asset) -> Result<(), DeskError> {
        if self.state != AllocationState::Draft {
            return Err(self.transition_error("edit"));
        }
        if self.lines.iter().any(|l| l.asset == asset.id) {
            return Err(DeskError::Validation(format!(
                "Asset {} is already on this allocation.",
                asset.name
            )));
        }
        if self.lines.len() >= MAX_ALLOCATION_LINES {
            return Err(DeskError::Validation(format!(
                "An allocation holds at most {} assets.",
                MAX_ALLOCATION_LINES
            )));
        }
        self.lines.push(AssetLine::snapshot(asset));
        Ok(())
    }

    /// Detach an asset from a draft. Returns false when it was not attached.
    pub fn remove_asset(&mut self, asset: AssetId) -> Result<bool, DeskError> {
        if self.state != AllocationState::Draft {
            return Err(self.transition_error("edit"));
        }
        let before = self.lines.len();
        self.lines.retain(|l| l.asset != asset);
        Ok(self.lines.len() != before)
    }

    /// Replace the lines wholesale (room assignments follow the room's assets).
    pub fn sync_lines(&mut self, lines: Vec<AssetLine>) -> Result<(), DeskError> {
        if !self.state.can_allocate() && self.state != AllocationState::Pending {
            return Err(self.transition_error("edit"));
        }
        self.lines = lines;
        Ok(())
    }

    /// True when any attached asset is flagged expensive.
    pub fn requires_approval<L: AssetLedger + ?Sized>(&self, ledger: &L) -> bool {
        self.lines
            .iter()
            .filter_map(|l| ledger.asset(l.asset))
            .any(|a| a.expensive)
    }

    /// Submit a draft, routing expensive requests to approval.
    pub fn submit<L: AssetLedger + ?Sized>(
        &mut self,
        ledger: &L,
    ) -> Result<SubmitOutcome, DeskError> {
        if self.state != AllocationState::Draft {
            return Err(self.transition_error("submit"));
        }
        if self.requires_approval(ledger) {
            self.state = AllocationState::Pending;
            Ok(SubmitOutcome::AwaitingApproval)
        } else {
            self.state = AllocationState::Submitted;
            Ok(SubmitOutcome::Ready)
        }
    }

    /// Approve a pending allocation.
    pub fn approve(&mut self, ctx: &ActionContext) -> Result<(), DeskError> {
        if self.state != AllocationState::Pending {
            return Err(self.transition_error("approve"));
        }
        self.state = AllocationState::Approved;
        self.approved_by = Some(ctx.actor);
        self.approved_at = Some(ctx.now);
        Ok(())
    }

    /// Send a submitted, pending or approved allocation back to draft.
    pub fn reset_to_draft(&mut self) -> Result<(), DeskError> {
        match self.state {
            AllocationState::Submitted | AllocationState::Pending | AllocationState::Approved => {
                self.state = AllocationState::Draft;
                self.approved_by = None;
                self.approved_at = None;
                Ok(())
            }
            _ => Err(self.transition_error("reset")),
        }
    }

    /// Line and asset guards shared by `allocate` and check-in opening:
    /// non-empty lines, every asset validated and free, then the kind guards.
    pub fn check_assets<L: AssetLedger + ?Sized>(
        &self,
        ledger: &L,
        guards: &[&dyn AllocationGuard<H>],
    ) -> Result<(), GuardFailure> {
        if self.lines.is_empty() {
            return Err(GuardFailure::EmptyLines);
        }
        for line in &self.lines {
            let asset = ledger
                .asset(line.asset)
                .ok_or(GuardFailure::UnknownAsset { asset: line.asset })?;
            if asset.state != AssetState::Validated {
                return Err(GuardFailure::NotValidated {
                    name: asset.name.clone(),
                });
            }
            if let Some(current) = &asset.binding.holder {
                if !self.holder.shares(current) {
                    return Err(GuardFailure::AlreadyBound {
                        name: asset.name.clone(),
                        holder: current.to_string(),
                    });
                }
            }
        }
        for guard in guards {
            guard.check(self)?;
        }
        Ok(())
    }

    /// Bind every asset to the holder.
    pub fn allocate<L: AssetLedger + ?Sized>(
        &mut self,
        ctx: &ActionContext,
        ledger: &mut L,
        check_in: Option<&Checklist>,
        guards: &[&dyn AllocationGuard<H>],
    ) -> Result<(), DeskError> {
        if !self.state.can_allocate() {
            return Err(self.transition_error("allocate"));
        }

        self.check_assets(&*ledger, guards)?;

        let checklist = check_in.ok_or(GuardFailure::CheckInMissing)?;
        if checklist.is_pending() {
            return Err(GuardFailure::CheckInPending.into());
        }
        if checklist.asset_counts() != self.asset_counts() {
            return Err(GuardFailure::ChecklistMismatch.into());
        }

        // All guards passed: bind.
        let holder = self.holder.holder_ref();
        for line in &self.lines {
            if let Some(asset) = ledger.asset_mut(line.asset) {
                asset.bind(holder);
            }
        }
        self.state = AllocationState::Allocated;
        self.allocated_at = Some(ctx.now);
        Ok(())
    }

    /// Release every asset after a verified check-out.
    pub fn return_assets<L: AssetLedger + ?Sized>(
        &mut self,
        ctx: &ActionContext,
        ledger: &mut L,
        check_out: Option<&Checklist>,
    ) -> Result<(), DeskError> {
        if self.state != AllocationState::Allocated {
            return Err(self.transition_error("return"));
        }
        let checklist = check_out.ok_or(GuardFailure::CheckOutMissing)?;
        if checklist.is_pending() {
            return Err(GuardFailure::CheckOutPending.into());
        }

        self.release_all(ledger);
        self.state = AllocationState::Returned;
        self.returned_at = Some(ctx.now);
        Ok(())
    }

    /// Cancel from any non-terminal state. An allocated record releases its
    /// assets on the way out.
    pub fn cancel<L: AssetLedger + ?Sized>(&mut self, ledger: &mut L) -> Result<(), DeskError> {
        if self.state.is_terminal() {
            return Err(self.transition_error("cancel"));
        }
        if self.state == AllocationState::Allocated {
            self.release_all(ledger);
        }
        self.state = AllocationState::Cancelled;
        Ok(())
    }

    /// Reject from any non-terminal state, recording the actor's reason.
    pub fn reject<L: AssetLedger + ?Sized>(
        &mut self,
        ledger: &mut L,
        reason: &str,
    ) -> Result<(), DeskError> {
        if self.state.is_terminal() {
            return Err(self.transition_error("reject"));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DeskError::Validation(
                "A rejection reason is required.".to_string(),
            ));
        }
        if reason.len() > MAX_TEXT_LENGTH {
            return Err(DeskError::Validation(format!(
                "Rejection reason exceeds {} bytes",
                MAX_TEXT_LENGTH
            )));
        }
        if self.state == AllocationState::Allocated {
            self.release_all(ledger);
        }
        self.state = AllocationState::Rejected;
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    fn release_all<L: AssetLedger + ?Sized>(&self, ledger: &mut L) {
        let holder = self.holder.holder_ref();
        for line in &self.lines {
            if let Some(asset) = ledger.asset_mut(line.asset) {
                asset.release(&holder);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::HolderRef;
    use crate::checklist::{ChecklistKind, ChecklistStatus};
    use crate::holder::{Assignee, Custodian};
    use crate::{ChecklistId, EmployeeId, ProjectId};
    use chrono::TimeZone;

    fn ctx() -> ActionContext {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 8, 30, 0).single().expect("ts");
        ActionContext::new(UserId(7), now)
    }

    fn ledger(ids: &[u64]) -> BTreeMap<AssetId, Asset> {
        ids.iter()
            .map(|&i| {
                let mut asset = Asset::new(AssetId(i), &format!("Asset {}", i)).expect("asset");
                asset.validate().expect("validate");
                (AssetId(i), asset)
            })
            .collect()
    }

    fn allocation(assets: &BTreeMap<AssetId, Asset>) -> Allocation<Custodian> {
        let mut alloc = Allocation::new(
            AllocationId(1),
            "ITA/00001".to_string(),
            AllocationKind::It,
            Custodian {
                employee: EmployeeId(3),
                project: None,
            },
            &ctx(),
        );
        for asset in assets.values() {
            alloc.add_asset(asset).expect("add");
        }
        alloc
    }

    fn verified(alloc: &Allocation<Custodian>, kind: ChecklistKind) -> Checklist {
        let mut list = Checklist::open(
            ChecklistId(1),
            "CKI/00001".to_string(),
            kind,
            alloc.id,
            alloc.holder.holder_ref(),
            &alloc.lines,
            ctx().now,
        );
        list.status = ChecklistStatus::Verified;
        list
    }

    #[test]
    fn allocate_without_checklist_reports_check_in_guard() {
        let mut assets = ledger(&[1, 2]);
        let mut alloc = allocation(&assets);

        let err = alloc
            .allocate(&ctx(), &mut assets, None, &[])
            .expect_err("no checklist");

        assert_eq!(
            err.to_string(),
            "Please check and verify the Check-In Checklist."
        );
        assert_eq!(alloc.state, AllocationState::Draft);
        assert!(assets.values().all(|a| !a.is_bound()));
    }

    #[test]
    fn allocate_binds_every_asset() {
        let mut assets = ledger(&[1, 2]);
        let mut alloc = allocation(&assets);
        let list = verified(&alloc, ChecklistKind::CheckIn);

        alloc
            .allocate(&ctx(), &mut assets, Some(&list), &[])
            .expect("allocate");

        assert_eq!(alloc.state, AllocationState::Allocated);
        assert_eq!(alloc.allocated_at, Some(ctx().now));
        for asset in assets.values() {
            assert_eq!(
                asset.binding.holder,
                Some(HolderRef::Employee {
                    employee: EmployeeId(3),
                    project: None
                })
            );
        }
    }

    #[test]
    fn pending_checklist_blocks_allocation() {
        let mut assets = ledger(&[1]);
        let mut alloc = allocation(&assets);
        let mut list = verified(&alloc, ChecklistKind::CheckIn);
        list.status = ChecklistStatus::Pending;

        let err = alloc
            .allocate(&ctx(), &mut assets, Some(&list), &[])
            .expect_err("pending");
        assert!(matches!(
            err,
            DeskError::Guard(GuardFailure::CheckInPending)
        ));
    }

    #[test]
    fn escalated_checklist_still_allows_allocation() {
        let mut assets = ledger(&[1]);
        let mut alloc = allocation(&assets);
        let mut list = verified(&alloc, ChecklistKind::CheckIn);
        list.status = ChecklistStatus::Escalated;

        alloc
            .allocate(&ctx(), &mut assets, Some(&list), &[])
            .expect("escalated is not pending");
    }

    #[test]
    fn checklist_subset_is_a_mismatch() {
        let mut assets = ledger(&[1, 2]);
        let mut alloc = allocation(&assets);
        let mut list = verified(&alloc, ChecklistKind::CheckIn);
        list.lines.pop();

        let err = alloc
            .allocate(&ctx(), &mut assets, Some(&list), &[])
            .expect_err("subset");
        assert!(matches!(
            err,
            DeskError::Guard(GuardFailure::ChecklistMismatch)
        ));
        assert!(assets.values().all(|a| !a.is_bound()));
    }

    #[test]
    fn bound_asset_blocks_and_names_holder() {
        let mut assets = ledger(&[1, 2]);
        let mut alloc = allocation(&assets);
        let list = verified(&alloc, ChecklistKind::CheckIn);
        if let Some(a) = assets.get_mut(&AssetId(2)) {
            a.bind(HolderRef::Project {
                project: ProjectId(9),
            });
        }

        let err = alloc
            .allocate(&ctx(), &mut assets, Some(&list), &[])
            .expect_err("bound");
        assert_eq!(
            err.to_string(),
            "Asset Asset 2 is already allocated to project 9."
        );
        assert!(!assets[&AssetId(1)].is_bound());
    }

    #[test]
    fn unvalidated_asset_blocks() {
        let mut assets = ledger(&[1]);
        if let Some(a) = assets.get_mut(&AssetId(1)) {
            a.state = AssetState::Damaged;
        }
        let mut alloc = allocation(&assets);
        let list = verified(&alloc, ChecklistKind::CheckIn);
        let err = alloc
            .allocate(&ctx(), &mut assets, Some(&list), &[])
            .expect_err("damaged");
        assert!(matches!(
            err,
            DeskError::Guard(GuardFailure::NotValidated { .. })
        ));
    }

    #[test]
    fn empty_allocation_blocks() {
        let mut assets = ledger(&[]);
        let mut alloc = allocation(&assets);
        let err = alloc
            .allocate(&ctx(), &mut assets, None, &[])
            .expect_err("empty");
        assert!(matches!(err, DeskError::Guard(GuardFailure::EmptyLines)));
    }

    #[test]
    fn expensive_submission_waits_for_approval() {
        let mut assets = ledger(&[1]);
        if let Some(a) = assets.get_mut(&AssetId(1)) {
            a.expensive = true;
        }
        let mut alloc = allocation(&assets);

        assert_eq!(
            alloc.submit(&assets).expect("submit"),
            SubmitOutcome::AwaitingApproval
        );
        assert_eq!(alloc.state, AllocationState::Pending);

        let list = verified(&alloc, ChecklistKind::CheckIn);
        assert!(matches!(
            alloc.allocate(&ctx(), &mut assets, Some(&list), &[]),
            Err(DeskError::InvalidTransition { .. })
        ));

        alloc.approve(&ctx()).expect("approve");
        assert_eq!(alloc.approved_by, Some(UserId(7)));
        alloc
            .allocate(&ctx(), &mut assets, Some(&list), &[])
            .expect("allocate after approval");
    }

    #[test]
    fn cheap_submission_is_ready() {
        let assets = ledger(&[1]);
        let mut alloc = allocation(&assets);
        assert_eq!(alloc.submit(&assets).expect("submit"), SubmitOutcome::Ready);
        assert_eq!(alloc.state, AllocationState::Submitted);
        assert!(alloc.approve(&ctx()).is_err());
    }

    #[test]
    fn return_requires_non_pending_check_out() {
        let mut assets = ledger(&[1]);
        let mut alloc = allocation(&assets);
        let check_in = verified(&alloc, ChecklistKind::CheckIn);
        alloc
            .allocate(&ctx(), &mut assets, Some(&check_in), &[])
            .expect("allocate");

        let err = alloc
            .return_assets(&ctx(), &mut assets, None)
            .expect_err("no check-out");
        assert_eq!(
            err.to_string(),
            "Please check and verify the Check-Out Checklist."
        );

        let check_out = verified(&alloc, ChecklistKind::CheckOut);
        alloc
            .return_assets(&ctx(), &mut assets, Some(&check_out))
            .expect("return");
        assert_eq!(alloc.state, AllocationState::Returned);
        assert!(!assets[&AssetId(1)].is_bound());
    }

    #[test]
    fn cancel_and_reject_are_terminal() {
        let mut assets = ledger(&[1]);
        let mut alloc = allocation(&assets);
        alloc.cancel(&mut assets).expect("cancel");
        assert!(alloc.cancel(&mut assets).is_err());
        assert!(alloc.reject(&mut assets, "late").is_err());

        let mut other = allocation(&assets);
        assert!(other.reject(&mut assets, "   ").is_err());
        other.reject(&mut assets, "Budget frozen").expect("reject");
        assert_eq!(other.rejection_reason.as_deref(), Some("Budget frozen"));
    }

    #[test]
    fn cancelling_allocated_releases_assets() {
        let mut assets = ledger(&[1]);
        let mut alloc = allocation(&assets);
        let list = verified(&alloc, ChecklistKind::CheckIn);
        alloc
            .allocate(&ctx(), &mut assets, Some(&list), &[])
            .expect("allocate");
        alloc.cancel(&mut assets).expect("cancel");
        assert!(!assets[&AssetId(1)].is_bound());
    }

    #[test]
    fn duplicate_line_rejected() {
        let assets = ledger(&[1]);
        let mut alloc: Allocation<Assignee> = Allocation::new(
            AllocationId(2),
            "EQA/00001".to_string(),
            AllocationKind::Equipment,
            Assignee::Project(ProjectId(1)),
            &ctx(),
        );
        let asset = &assets[&AssetId(1)];
        alloc.add_asset(asset).expect("first");
        assert!(alloc.add_asset(asset).is_err());
    }
}
