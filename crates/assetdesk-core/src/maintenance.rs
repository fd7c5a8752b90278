//! # Maintenance
//!
//! Preventive maintenance plans with their recurrence job, maintenance
//! requests, and the follow-up (procurement) requests spawned when a
//! checklist escalates.

use crate::checklist::{Checklist, FlaggedLine, LineStatus};
use crate::{AssetId, ChecklistId, DeskError, RecordId, RoomId, check_text};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// PLANS AND REQUESTS
// =============================================================================

/// Preventive schedule for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub asset: AssetId,
    /// Days between preventive actions; 0 disables the plan.
    pub period_days: u32,
    pub next_action_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceKind {
    Preventive,
    Corrective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    New,
    InProgress,
    Done,
}

impl RequestState {
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self != Self::Done
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub id: RecordId,
    pub reference: String,
    pub asset: AssetId,
    pub kind: MaintenanceKind,
    pub request_date: NaiveDate,
    pub state: RequestState,
    pub description: Option<String>,
}

/// A preventive request the recurrence job wants opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueRequest {
    pub asset: AssetId,
    pub request_date: NaiveDate,
}

/// Plans and requests, keyed for deterministic iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceBook {
    pub plans: BTreeMap<AssetId, MaintenancePlan>,
    pub requests: BTreeMap<RecordId, MaintenanceRequest>,
}

impl MaintenanceBook {
    pub fn set_plan(&mut self, plan: MaintenancePlan) {
        self.plans.insert(plan.asset, plan);
    }

    fn has_open_preventive(&self, asset: AssetId, date: NaiveDate) -> bool {
        self.requests.values().any(|r| {
            r.asset == asset
                && r.kind == MaintenanceKind::Preventive
                && r.state.is_open()
                && r.request_date == date
        })
    }

    /// Advance every active plan that has no open preventive request on its
    /// next action date, returning the requests to open on the new dates.
    ///
    /// A plan without a next action date is skipped.
    pub fn advance_plans(&mut self) -> Vec<DueRequest> {
        let mut due = Vec::new();
        let assets: Vec<AssetId> = self.plans.keys().copied().collect();
        for asset in assets {
            let Some(plan) = self.plans.get(&asset) else {
                continue;
            };
            if plan.period_days == 0 {
                continue;
            }
            let Some(date) = plan.next_action_date else {
                continue;
            };
            if self.has_open_preventive(asset, date) {
                continue;
            }
            let next = date + Duration::days(i64::from(plan.period_days));
            if let Some(plan) = self.plans.get_mut(&asset) {
                plan.next_action_date = Some(next);
            }
            due.push(DueRequest {
                asset,
                request_date: next,
            });
        }
        due
    }

    pub fn open_request(&mut self, request: MaintenanceRequest) -> Result<(), DeskError> {
        if let Some(text) = &request.description {
            check_text("Description", text)?;
        }
        self.requests.insert(request.id, request);
        Ok(())
    }

    pub fn set_request_state(&mut self, id: RecordId, state: RequestState) -> Result<(), DeskError> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| DeskError::not_found("Maintenance request", id.0))?;
        request.state = state;
        Ok(())
    }
}

// =============================================================================
// FOLLOW-UP REQUESTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpState {
    New,
    Approved,
    Done,
}

/// Replacement or repair request for an asset reported missing or damaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpRequest {
    pub id: RecordId,
    pub reference: String,
    pub asset: AssetId,
    pub status: LineStatus,
    pub checklist: ChecklistId,
    pub room: Option<RoomId>,
    pub state: FollowUpState,
}

impl FollowUpRequest {
    /// One request per flagged line of an escalated checklist.
    #[must_use]
    pub fn from_flagged(
        id: RecordId,
        reference: String,
        checklist: &Checklist,
        line: &FlaggedLine,
    ) -> Self {
        Self {
            id,
            reference,
            asset: line.asset,
            status: line.status,
            checklist: checklist.id,
            room: checklist.room,
            state: FollowUpState::New,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state != FollowUpState::Done
    }

    pub fn advance(&mut self) -> Result<(), DeskError> {
        self.state = match self.state {
            FollowUpState::New => FollowUpState::Approved,
            FollowUpState::Approved => FollowUpState::Done,
            FollowUpState::Done => {
                return Err(DeskError::InvalidTransition {
                    action: "advance",
                    state: "done",
                });
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).expect("date")
    }

    fn book(period: u32, next: Option<NaiveDate>) -> MaintenanceBook {
        let mut book = MaintenanceBook::default();
        book.set_plan(MaintenancePlan {
            asset: AssetId(1),
            period_days: period,
            next_action_date: next,
        });
        book
    }

    #[test]
    fn plan_advances_by_period() {
        let mut book = book(7, Some(day(1)));
        let due = book.advance_plans();
        assert_eq!(
            due,
            vec![DueRequest {
                asset: AssetId(1),
                request_date: day(8)
            }]
        );
        assert_eq!(book.plans[&AssetId(1)].next_action_date, Some(day(8)));
    }

    #[test]
    fn open_request_on_date_blocks_recurrence() {
        let mut book = book(7, Some(day(1)));
        book.open_request(MaintenanceRequest {
            id: RecordId(1),
            reference: "MRQ/00001".to_string(),
            asset: AssetId(1),
            kind: MaintenanceKind::Preventive,
            request_date: day(1),
            state: RequestState::New,
            description: None,
        })
        .expect("open");
        assert!(book.advance_plans().is_empty());

        book.set_request_state(RecordId(1), RequestState::Done)
            .expect("done");
        assert_eq!(book.advance_plans().len(), 1);
    }

    #[test]
    fn disabled_or_undated_plans_are_skipped() {
        assert!(book(0, Some(day(1))).advance_plans().is_empty());
        assert!(book(5, None).advance_plans().is_empty());
    }

    #[test]
    fn follow_up_advances_to_done() {
        let mut follow = FollowUpRequest {
            id: RecordId(1),
            reference: "PRQ/00001".to_string(),
            asset: AssetId(2),
            status: LineStatus::Missing,
            checklist: ChecklistId(3),
            room: None,
            state: FollowUpState::New,
        };
        follow.advance().expect("approve");
        follow.advance().expect("done");
        assert!(!follow.is_open());
        assert!(follow.advance().is_err());
    }
}
