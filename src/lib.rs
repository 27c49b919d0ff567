//! # tsheet
//!
//! Timesheet aggregation with overwork warnings.
//!
//! Task records (`a_date` in `DD-MMM-YYYY`, `effort` in hours as text, a project code
//! and a status letter) are bucketed into the calendar days of a week or month,
//! totalled per day, per project and per period, and checked against a fixed 9-hour
//! daily ceiling. A warning about overworked days can be dismissed per period; the
//! dismissal is kept in a key/value store next to a content hash of the records and
//! is dropped as soon as the records change.
//!
//! ```no_run
//! use chrono::Local;
//! use tsheet::aggregate::aggregate;
//! use tsheet::fields::WeekStart;
//! use tsheet::period::PeriodAnchor;
//! use tsheet::record::RecordSet;
//! use tsheet::threshold::{violations, warning_message};
//!
//! let today = Local::now().date_naive();
//! let set = RecordSet::load("records.json".as_ref()).unwrap();
//! let anchor = PeriodAnchor::week_containing(today, WeekStart::Monday);
//! let agg = aggregate(&set.records, &anchor, today);
//! if let Some(message) = warning_message(&violations(&agg.summary)) {
//!     println!("{message}");
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod dismissal;
pub mod error;
pub mod fields;
pub mod period;
pub mod record;
pub mod threshold;

pub use error::{Error, Result};
