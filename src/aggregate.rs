//! Period aggregation: buckets task records into calendar days and totals them.
//!
//! `aggregate` is a pure function of its inputs. Callers re-run it whenever the record
//! list or the requested period changes; nothing is cached between calls.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fields::StatusCounts;
use crate::period::{day_key, PeriodAnchor, PeriodWindow};
use crate::record::TaskRecord;
use crate::threshold::DAILY_CEILING_HOURS;

/// All records of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    /// Records in source order.
    pub tasks: Vec<TaskRecord>,
    pub total_hours: f64,
    pub projects: BTreeSet<String>,
    pub status_counts: StatusCounts,
}

impl DayBucket {
    pub fn new(date: NaiveDate) -> Self {
        DayBucket {
            date,
            tasks: Vec::new(),
            total_hours: 0.0,
            projects: BTreeSet::new(),
            status_counts: StatusCounts::default(),
        }
    }
}

/// Hours and record count booked against one project code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTotal {
    pub hours: f64,
    pub task_count: usize,
}

/// Totals over every bucket of a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub total_hours: f64,
    pub project_totals: BTreeMap<String, ProjectTotal>,
    pub max_day_hours: f64,
    /// Day keys above the daily ceiling, in the order they first went over.
    pub exceeding_days: Vec<String>,
    pub exceeds_limit: bool,
}

/// Result of aggregating records over a period.
///
/// `window` is `None` when the requested anchor could not be resolved; the buckets are
/// then empty and the summary zeroed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub window: Option<PeriodWindow>,
    /// Buckets keyed by `YYYY-MM-DD`.
    pub buckets: BTreeMap<String, DayBucket>,
    pub summary: PeriodSummary,
    /// Records dropped because their date did not parse.
    pub skipped: usize,
}

impl Aggregation {
    pub fn period_key(&self) -> Option<String> {
        self.window.map(|w| w.key())
    }

    pub fn bucket(&self, date: NaiveDate) -> Option<&DayBucket> {
        self.buckets.get(&day_key(date))
    }
}

/// Aggregate `records` over the period named by `anchor`.
///
/// `today` only matters for the current month, whose window is clipped (see
/// [`PeriodWindow::month`]).
pub fn aggregate(records: &[TaskRecord], anchor: &PeriodAnchor, today: NaiveDate) -> Aggregation {
    match PeriodWindow::resolve(anchor, records, today) {
        Some(window) => aggregate_window(records, window),
        None => {
            debug!(anchor = anchor.text(), "Unresolvable period anchor, returning empty aggregation");
            Aggregation::default()
        }
    }
}

/// Aggregate `records` over an already resolved window.
pub fn aggregate_window(records: &[TaskRecord], window: PeriodWindow) -> Aggregation {
    let mut buckets: BTreeMap<String, DayBucket> = window
        .days()
        .map(|day| (day_key(day), DayBucket::new(day)))
        .collect();
    let mut summary = PeriodSummary::default();
    let mut skipped = 0usize;

    for record in records {
        let Some(date) = record.date() else {
            debug!(id = %record.id, a_date = %record.a_date, "Skipping record with unparseable date");
            skipped += 1;
            continue;
        };
        let key = day_key(date);
        let Some(bucket) = buckets.get_mut(&key) else {
            continue;
        };

        let hours = record.hours();
        let project = record.project();

        bucket.tasks.push(record.clone());
        bucket.total_hours += hours;
        bucket.projects.insert(project.clone());
        bucket.status_counts.record(record.record_status());

        summary.total_hours += hours;
        let entry = summary.project_totals.entry(project).or_default();
        entry.hours += hours;
        entry.task_count += 1;

        if bucket.total_hours > summary.max_day_hours {
            summary.max_day_hours = bucket.total_hours;
        }
        if bucket.total_hours > DAILY_CEILING_HOURS && !summary.exceeding_days.contains(&key) {
            summary.exceeding_days.push(key);
        }
    }

    summary.exceeds_limit = !summary.exceeding_days.is_empty();

    Aggregation {
        window: Some(window),
        buckets,
        summary,
        skipped,
    }
}

/// Records whose date falls inside `window`, in source order.
pub fn records_in_window(records: &[TaskRecord], window: &PeriodWindow) -> Vec<TaskRecord> {
    records
        .iter()
        .filter(|r| r.date().is_some_and(|d| window.contains(d)))
        .cloned()
        .collect()
}
