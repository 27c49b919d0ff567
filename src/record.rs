//! Task record data structure and the JSON record file.
//!
//! A `TaskRecord` keeps the fields exactly as the record feed delivers them so that
//! the content hash reflects the source data. Interpretation (dates, hours, status,
//! project codes) happens through accessor methods that never fail.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fields::RecordStatus;
use crate::period::parse_record_date;

/// One unit of reported work.
///
/// Field names follow the record feed: `a_date` is the `DD-MMM-YYYY` date of the work,
/// `effort` the hours as text. Numeric JSON values are accepted for `id` and `effort`
/// and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default, deserialize_with = "id_text")]
    pub id: String,
    #[serde(default)]
    pub a_date: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub project_code: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub effort: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub remarks: Option<String>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, a_date: impl Into<String>) -> Self {
        TaskRecord {
            id: id.into(),
            a_date: a_date.into(),
            project_code: None,
            effort: None,
            status: None,
            remarks: None,
        }
    }

    pub fn with_effort(mut self, effort: impl Into<String>) -> Self {
        self.effort = Some(effort.into());
        self
    }

    pub fn with_project(mut self, project_code: impl Into<String>) -> Self {
        self.project_code = Some(project_code.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Calendar date of the record, or `None` if `a_date` is not strict `DD-MMM-YYYY`.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_record_date(&self.a_date)
    }

    /// Reported hours; malformed or missing effort counts as zero.
    pub fn hours(&self) -> f64 {
        parse_effort(self.effort.as_deref())
    }

    pub fn record_status(&self) -> RecordStatus {
        RecordStatus::from_code(self.status.as_deref())
    }

    /// Project code with surrounding whitespace removed.
    pub fn project(&self) -> String {
        normalise_project_code(self.project_code.as_deref().unwrap_or(""))
    }
}

/// Parse an effort value into hours.
///
/// Missing, unparseable, negative and non-finite values all yield `0.0`.
pub fn parse_effort(s: Option<&str>) -> f64 {
    match s.map(str::trim).and_then(|t| t.parse::<f64>().ok()) {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

pub fn normalise_project_code(s: &str) -> String {
    s.trim().to_string()
}

fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn id_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

/// Accepted layouts of a record file: a bare array or `{ "records": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    List(Vec<TaskRecord>),
    Wrapped { records: Vec<TaskRecord> },
}

/// Records loaded from (and saved to) a local JSON file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub records: Vec<TaskRecord>,
}

impl RecordSet {
    /// Load records from a JSON file. A missing file is an empty record set.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(RecordSet::default());
        }
        let mut buf = String::new();
        File::open(path)?.read_to_string(&mut buf)?;
        Self::from_json(&buf)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let records = match serde_json::from_str::<RecordFile>(text)? {
            RecordFile::List(records) => records,
            RecordFile::Wrapped { records } => records,
        };
        Ok(RecordSet { records })
    }

    /// Save records to a JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(self)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Generate the next available numeric record id.
    pub fn next_id(&self) -> String {
        let max = self
            .records
            .iter()
            .filter_map(|r| r.id.trim().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }

    /// Append a record, rejecting duplicate ids and dates that fail the strict grammar.
    pub fn push(&mut self, record: TaskRecord) -> Result<()> {
        if record.date().is_none() {
            return Err(Error::InvalidRecord(format!(
                "date '{}' is not in DD-MMM-YYYY form",
                record.a_date
            )));
        }
        if self.records.iter().any(|r| r.id == record.id) {
            return Err(Error::InvalidRecord(format!("duplicate id '{}'", record.id)));
        }
        self.records.push(record);
        Ok(())
    }
}
