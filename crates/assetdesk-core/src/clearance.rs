//! # Exit Clearance
//!
//! Transfer/resignation clearance for an employee leaving a room. Processing
//! a clearance against a check-out checklist charges every damaged or
//! missing line at its cost snapshot.

use crate::checklist::{Checklist, LineStatus};
use crate::{AssetId, ChecklistId, DeskError, EmployeeId, RecordId, RoomId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceState {
    Pending,
    Cleared,
    Deducted,
}

impl ClearanceState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Cleared => "cleared",
            Self::Deducted => "deducted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub asset: AssetId,
    pub status: LineStatus,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceRequest {
    pub id: RecordId,
    pub reference: String,
    pub employee: EmployeeId,
    pub room: RoomId,
    pub checklist: Option<ChecklistId>,
    pub date: NaiveDate,
    pub state: ClearanceState,
    pub deductions: Vec<Deduction>,
}

impl ClearanceRequest {
    #[must_use]
    pub fn new(
        id: RecordId,
        reference: String,
        employee: EmployeeId,
        room: RoomId,
        date: NaiveDate,
    ) -> Self {
        Self {
            id,
            reference,
            employee,
            room,
            checklist: None,
            date,
            state: ClearanceState::Pending,
            deductions: Vec::new(),
        }
    }

    #[must_use]
    pub fn total_cents(&self) -> i64 {
        self.deductions
            .iter()
            .fold(0i64, |acc, d| acc.saturating_add(d.amount_cents))
    }

    /// Compute deductions from `checklist` and settle the request.
    pub fn process(&mut self, checklist: &Checklist) -> Result<(), DeskError> {
        if self.state != ClearanceState::Pending {
            return Err(DeskError::InvalidTransition {
                action: "process",
                state: self.state.name(),
            });
        }
        if checklist.room.is_some_and(|r| r != self.room) {
            return Err(DeskError::Validation(
                "The checklist belongs to a different room.".to_string(),
            ));
        }
        self.deductions = checklist
            .lines
            .iter()
            .filter_map(|line| {
                let status = line.status.filter(LineStatus::is_issue)?;
                Some(Deduction {
                    asset: line.asset,
                    status,
                    amount_cents: line.cost_cents,
                })
            })
            .collect();
        self.checklist = Some(checklist.id);
        self.state = if self.deductions.is_empty() {
            ClearanceState::Cleared
        } else {
            ClearanceState::Deducted
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::AssetLine;
    use crate::asset::HolderRef;
    use crate::checklist::ChecklistKind;
    use crate::AllocationId;
    use chrono::{TimeZone, Utc};

    fn checkout(statuses: &[LineStatus]) -> Checklist {
        let lines: Vec<AssetLine> = statuses
            .iter()
            .enumerate()
            .map(|(i, _)| AssetLine {
                asset: AssetId(i as u64 + 1),
                serial: None,
                tag: None,
                cost_cents: 2_500,
            })
            .collect();
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).single().expect("ts");
        let mut list = Checklist::open(
            ChecklistId(9),
            "CKO/00001".to_string(),
            ChecklistKind::CheckOut,
            AllocationId(1),
            HolderRef::Room { room: RoomId(3) },
            &lines,
            now,
        );
        for (line, status) in list.lines.iter_mut().zip(statuses) {
            line.status = Some(*status);
        }
        list
    }

    fn request() -> ClearanceRequest {
        ClearanceRequest::new(
            RecordId(1),
            "CLR/00001".to_string(),
            EmployeeId(5),
            RoomId(3),
            NaiveDate::from_ymd_opt(2026, 7, 1).expect("date"),
        )
    }

    #[test]
    fn damaged_and_missing_lines_are_deducted() {
        let mut clearance = request();
        clearance
            .process(&checkout(&[LineStatus::Ok, LineStatus::Damaged, LineStatus::Missing]))
            .expect("process");
        assert_eq!(clearance.state, ClearanceState::Deducted);
        assert_eq!(clearance.deductions.len(), 2);
        assert_eq!(clearance.total_cents(), 5_000);
        assert!(clearance.process(&checkout(&[])).is_err());
    }

    #[test]
    fn clean_checklist_clears() {
        let mut clearance = request();
        clearance
            .process(&checkout(&[LineStatus::Ok]))
            .expect("process");
        assert_eq!(clearance.state, ClearanceState::Cleared);
        assert_eq!(clearance.total_cents(), 0);
    }
}
