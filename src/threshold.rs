//! Daily ceiling checks.
//!
//! The aggregator already records which days went over the ceiling; this module only
//! turns that list into something a user can read. Hours are never recomputed here.

use serde::{Deserialize, Serialize};

use crate::aggregate::PeriodSummary;
use crate::period::{day_label, parse_day_key};

/// Hours per day above which a day counts as overworked. A day at exactly the
/// ceiling is fine.
pub const DAILY_CEILING_HOURS: f64 = 9.0;

/// A day over the ceiling, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// `YYYY-MM-DD` bucket key.
    pub day_key: String,
    pub label: String,
}

/// Violations of a summary, in the order the days first went over the ceiling.
pub fn violations(summary: &PeriodSummary) -> Vec<Violation> {
    if !summary.exceeds_limit {
        return Vec::new();
    }
    summary
        .exceeding_days
        .iter()
        .map(|key| Violation {
            day_key: key.clone(),
            label: parse_day_key(key).map(day_label).unwrap_or_else(|| key.clone()),
        })
        .collect()
}

/// Warning text listing the offending days, or `None` when there are none.
pub fn warning_message(violations: &[Violation]) -> Option<String> {
    if violations.is_empty() {
        return None;
    }
    let days = violations
        .iter()
        .map(|v| v.label.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Some(format!(
        "More than {} hours recorded on {} day(s): {}",
        DAILY_CEILING_HOURS,
        violations.len(),
        days
    ))
}
