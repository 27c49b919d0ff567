//! Enumerations and field types for timesheet records.
//!
//! Defines the closed status enumeration that replaces the single-letter codes
//! found in record feeds, along with the period and calendar options used by the CLI.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Review state of a reported record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    Submitted,
    Approved,
    Rejected,
    Draft,
}

impl RecordStatus {
    /// Map a raw status code to a status.
    ///
    /// Accepts the feed letters `s`, `a`, `r`, `n` and the full words, case-insensitively.
    /// Anything else, including an absent value, is a draft.
    pub fn from_code(code: Option<&str>) -> Self {
        let Some(code) = code else {
            return RecordStatus::Draft;
        };
        match code.trim().to_lowercase().as_str() {
            "s" | "submitted" => RecordStatus::Submitted,
            "a" | "approved" => RecordStatus::Approved,
            "r" | "rejected" => RecordStatus::Rejected,
            _ => RecordStatus::Draft,
        }
    }

    /// The single-letter feed code for this status.
    pub fn code(self) -> &'static str {
        match self {
            RecordStatus::Submitted => "s",
            RecordStatus::Approved => "a",
            RecordStatus::Rejected => "r",
            RecordStatus::Draft => "n",
        }
    }
}

/// Per-status tally of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub submitted: usize,
    pub approved: usize,
    pub rejected: usize,
    pub draft: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Submitted => self.submitted += 1,
            RecordStatus::Approved => self.approved += 1,
            RecordStatus::Rejected => self.rejected += 1,
            RecordStatus::Draft => self.draft += 1,
        }
    }

    pub fn get(&self, status: RecordStatus) -> usize {
        match status {
            RecordStatus::Submitted => self.submitted,
            RecordStatus::Approved => self.approved,
            RecordStatus::Rejected => self.rejected,
            RecordStatus::Draft => self.draft,
        }
    }

    pub fn total(&self) -> usize {
        self.submitted + self.approved + self.rejected + self.draft
    }
}

/// First day of the calendar week used when no explicit week start is given.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

/// Shape of a period window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodKind {
    Week,
    Month,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_code() {
        assert_eq!(RecordStatus::from_code(Some("s")), RecordStatus::Submitted);
        assert_eq!(RecordStatus::from_code(Some("A")), RecordStatus::Approved);
        assert_eq!(RecordStatus::from_code(Some(" r ")), RecordStatus::Rejected);
        assert_eq!(RecordStatus::from_code(Some("n")), RecordStatus::Draft);
        assert_eq!(RecordStatus::from_code(Some("Approved")), RecordStatus::Approved);
        assert_eq!(RecordStatus::from_code(Some("x")), RecordStatus::Draft);
        assert_eq!(RecordStatus::from_code(Some("")), RecordStatus::Draft);
        assert_eq!(RecordStatus::from_code(None), RecordStatus::Draft);
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.record(RecordStatus::Submitted);
        counts.record(RecordStatus::Submitted);
        counts.record(RecordStatus::Draft);
        assert_eq!(counts.get(RecordStatus::Submitted), 2);
        assert_eq!(counts.get(RecordStatus::Approved), 0);
        assert_eq!(counts.total(), 3);
    }
}
