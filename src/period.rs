//! Calendar handling: strict record-date parsing, period anchors and period windows.
//!
//! Record dates use the fixed `DD-MMM-YYYY` form (`05-Jan-2025`). Period keys and
//! bucket keys use `YYYY-MM-DD` for days and weeks and `YYYY-MM` for months.

use chrono::{Datelike, Days, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::fields::{PeriodKind, WeekStart};
use crate::record::TaskRecord;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Parse a record date in strict `DD-MMM-YYYY` form.
///
/// The day must be two digits (01-31), the month a three-letter English abbreviation
/// (any case) and the year four digits within 1900-2100. The date must also exist,
/// so `31-Feb-2025` is rejected.
pub fn parse_record_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('-');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    if day.len() != 2 || !day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let day: u32 = day.parse().ok()?;
    if !(1..=31).contains(&day) {
        return None;
    }

    if month.len() != 3 || !month.is_ascii() {
        return None;
    }
    let month = month.to_ascii_lowercase();
    let month = MONTHS.iter().position(|m| *m == month)? as u32 + 1;

    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format a date the way record feeds write it (`05-Jan-2025`).
pub fn format_record_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// Bucket key for a calendar day (`2025-01-05`).
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Human-readable day label (`Sun, 05 Jan 2025`).
pub fn day_label(date: NaiveDate) -> String {
    date.format("%a, %d %b %Y").to_string()
}

/// First day of the week containing `day`.
pub fn start_of_week(day: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let offset = match week_start {
        WeekStart::Monday => day.weekday().num_days_from_monday(),
        WeekStart::Sunday => day.weekday().num_days_from_sunday(),
    };
    day - Duration::days(offset as i64)
}

/// Last calendar day of the given month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next - Duration::days(1))
}

/// Parse a day given on the command line: `today`, `yesterday`, `tomorrow`,
/// `YYYY-MM-DD` or `DD-MMM-YYYY`.
pub fn parse_day_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim();
    match s.to_lowercase().as_str() {
        "today" => return Some(today),
        "yesterday" => return Some(today - Duration::days(1)),
        "tomorrow" => return Some(today + Duration::days(1)),
        _ => {}
    }
    parse_day_key(s).or_else(|| parse_record_date(s))
}

/// Parse a `YYYY-MM-DD` day key. The year must be exactly four digits.
pub fn parse_day_key(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let b = s.as_bytes();
    let shaped = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter().enumerate().all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a `YYYY-MM` month anchor.
pub fn parse_month_anchor(s: &str) -> Option<(i32, u32)> {
    let (year, month) = s.trim().split_once('-')?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if month.is_empty() || month.len() > 2 || !month.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)?;
    Some((year, month))
}

/// Parse a `YYYY-MM-DD` week-start anchor.
pub fn parse_week_anchor(s: &str) -> Option<NaiveDate> {
    parse_day_key(s)
}

/// A caller's request for a period, as text.
///
/// Anchors stay textual so that an invalid anchor can be carried to the aggregator,
/// which answers it with an empty result instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "anchor", rename_all = "kebab-case")]
pub enum PeriodAnchor {
    /// Week starting on the given `YYYY-MM-DD` date.
    Week(String),
    /// Calendar month given as `YYYY-MM`.
    Month(String),
}

impl PeriodAnchor {
    pub fn week(start: NaiveDate) -> Self {
        PeriodAnchor::Week(day_key(start))
    }

    pub fn month(year: i32, month: u32) -> Self {
        PeriodAnchor::Month(format!("{:04}-{:02}", year, month))
    }

    /// Week containing `day`, starting on the configured weekday.
    pub fn week_containing(day: NaiveDate, week_start: WeekStart) -> Self {
        Self::week(start_of_week(day, week_start))
    }

    pub fn month_containing(day: NaiveDate) -> Self {
        Self::month(day.year(), day.month())
    }

    pub fn kind(&self) -> PeriodKind {
        match self {
            PeriodAnchor::Week(_) => PeriodKind::Week,
            PeriodAnchor::Month(_) => PeriodKind::Month,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            PeriodAnchor::Week(s) | PeriodAnchor::Month(s) => s,
        }
    }
}

/// Resolved calendar range of a period, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub kind: PeriodKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    /// Seven days starting at `start`, or `None` if the week runs past the last
    /// representable date.
    pub fn week(start: NaiveDate) -> Option<Self> {
        let end = start.checked_add_days(Days::new(6))?;
        Some(PeriodWindow {
            kind: PeriodKind::Week,
            start,
            end,
        })
    }

    /// A calendar month.
    ///
    /// When `today` falls inside the month, the window ends at the later of `today`
    /// and `latest_record`, kept within the month.
    pub fn month(
        year: i32,
        month: u32,
        latest_record: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let month_end = last_day_of_month(year, month)?;
        let end = if today.year() == year && today.month() == month {
            let reach = latest_record.map_or(today, |latest| latest.max(today));
            reach.clamp(start, month_end)
        } else {
            month_end
        };
        Some(PeriodWindow {
            kind: PeriodKind::Month,
            start,
            end,
        })
    }

    /// Resolve an anchor against the records and today's date.
    ///
    /// Returns `None` when the anchor text does not parse.
    pub fn resolve(anchor: &PeriodAnchor, records: &[TaskRecord], today: NaiveDate) -> Option<Self> {
        match anchor {
            PeriodAnchor::Week(text) => parse_week_anchor(text).and_then(Self::week),
            PeriodAnchor::Month(text) => {
                let (year, month) = parse_month_anchor(text)?;
                let latest = records.iter().filter_map(TaskRecord::date).max();
                Self::month(year, month, latest, today)
            }
        }
    }

    /// Every day of the window in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Stable identity of the period: `YYYY-MM-DD` for weeks, `YYYY-MM` for months.
    pub fn key(&self) -> String {
        match self.kind {
            PeriodKind::Week => day_key(self.start),
            PeriodKind::Month => self.start.format("%Y-%m").to_string(),
        }
    }

    pub fn label(&self) -> String {
        match self.kind {
            PeriodKind::Week => format!(
                "Week of {} to {}",
                self.start.format("%d %b %Y"),
                self.end.format("%d %b %Y")
            ),
            PeriodKind::Month => self.start.format("%B %Y").to_string(),
        }
    }
}
