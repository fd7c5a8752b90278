//! # Overlap Conflicts
//!
//! Closed-interval overlap detection and conflict reports for scheduled
//! resources (vehicles, drivers).
//!
//! Two intervals conflict iff `a.start <= b.end && a.end >= b.start`; a shared
//! boundary instant counts. A check whose candidate lacks either endpoint is
//! skipped, not failed.

use crate::DeskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Date-time format used when listing conflicting records.
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DeskError> {
        if end < start {
            return Err(DeskError::Validation(
                "End time must not be before start time.".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Build an interval only when both endpoints are present.
    ///
    /// An inverted pair is still returned so the overlap test behaves like
    /// the plain comparison on the raw endpoints.
    #[must_use]
    pub fn from_bounds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) => Some(Self { start, end }),
            _ => None,
        }
    }

    #[must_use]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(STAMP_FORMAT),
            self.end.format(STAMP_FORMAT)
        )
    }
}

/// One titled group of conflicting records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSection {
    pub title: String,
    pub entries: Vec<String>,
}

/// Accumulates conflicts for one candidate window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    window: Option<Interval>,
    sections: Vec<ConflictSection>,
}

impl ConflictReport {
    /// Start a report for the candidate bounds.
    #[must_use]
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            window: Interval::from_bounds(start, end),
            sections: Vec::new(),
        }
    }

    /// True when the candidate has both endpoints and will be checked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.window.is_some()
    }

    /// Add a section listing every record whose interval overlaps the
    /// candidate. Records without both endpoints never conflict.
    pub fn section<I, S>(&mut self, title: &str, records: I)
    where
        I: IntoIterator<Item = (S, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>,
        S: std::fmt::Display,
    {
        let Some(window) = self.window else {
            return;
        };
        let entries: Vec<String> = records
            .into_iter()
            .filter_map(|(label, start, end)| {
                let interval = Interval::from_bounds(start, end)?;
                window
                    .overlaps(&interval)
                    .then(|| format!(" • {} ({})", label, interval))
            })
            .collect();
        if !entries.is_empty() {
            self.sections.push(ConflictSection {
                title: title.to_string(),
                entries,
            });
        }
    }

    #[must_use]
    pub fn sections(&self) -> &[ConflictSection] {
        &self.sections
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.sections.is_empty()
    }

    /// Multi-line message enumerating every conflicting record.
    #[must_use]
    pub fn message(&self) -> String {
        self.sections
            .iter()
            .map(|s| {
                let mut block = s.title.clone();
                for entry in &s.entries {
                    block.push('\n');
                    block.push_str(entry);
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fail with the composed message when any section is non-empty.
    pub fn into_result(self) -> Result<(), DeskError> {
        if self.is_clear() {
            Ok(())
        } else {
            Err(DeskError::Conflict(self.message()))
        }
    }
}
