//! # Custody Log
//!
//! Asset transfer history written whenever a checklist is verified. One
//! entry per asset, holder and day; a second verification on the same day
//! overwrites the recorded condition.

use crate::asset::HolderRef;
use crate::checklist::{Checklist, ChecklistKind, LineStatus};
use crate::{AssetId, ChecklistId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEntry {
    pub asset: AssetId,
    pub holder: HolderRef,
    pub checklist: ChecklistId,
    pub kind: ChecklistKind,
    pub date: NaiveDate,
    pub condition: Option<LineStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyLog {
    entries: Vec<CustodyEntry>,
}

impl CustodyLog {
    /// Record every line of a verified checklist.
    pub fn record(&mut self, checklist: &Checklist, date: NaiveDate) {
        for line in &checklist.lines {
            let existing = self.entries.iter_mut().find(|e| {
                e.asset == line.asset && e.holder == checklist.holder && e.date == date
            });
            match existing {
                Some(entry) => {
                    entry.condition = line.status;
                    entry.checklist = checklist.id;
                    entry.kind = checklist.kind;
                }
                None => self.entries.push(CustodyEntry {
                    asset: line.asset,
                    holder: checklist.holder,
                    checklist: checklist.id,
                    kind: checklist.kind,
                    date,
                    condition: line.status,
                }),
            }
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[CustodyEntry] {
        &self.entries
    }

    /// History of one asset, oldest first.
    pub fn for_asset(&self, asset: AssetId) -> impl Iterator<Item = &CustodyEntry> {
        self.entries.iter().filter(move |e| e.asset == asset)
    }
}
