//! Command implementations for the CLI interface.
//!
//! Each subcommand loads the record file, aggregates the requested period and either
//! prints it, exports it or updates the dismissal state for it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::json;

use tsheet::aggregate::{aggregate, records_in_window, Aggregation};
use tsheet::config::Config;
use tsheet::dismissal::{content_hash, hash_key, DismissalTracker, JsonFileStore, KeyValueStore, WarningDecision};
use tsheet::fields::RecordStatus;
use tsheet::period::{format_record_date, parse_day_input, parse_month_anchor, PeriodAnchor, PeriodWindow};
use tsheet::record::{parse_effort, RecordSet, TaskRecord};
use tsheet::threshold::{violations, warning_message, DAILY_CEILING_HOURS};

#[derive(Subcommand)]
pub enum Commands {
    /// Show the daily breakdown of a week.
    Week {
        /// Any day of the week: YYYY-MM-DD, DD-MMM-YYYY, "today" or "yesterday" (default: today).
        day: Option<String>,
        /// Print the aggregation as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the daily breakdown of a month.
    Month {
        /// Month as YYYY-MM (default: current month).
        month: Option<String>,
        /// Print the aggregation as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Acknowledge the overwork warning of a period until its records change.
    Dismiss {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Forget the stored dismissal of a period.
    Reset {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Add a record.
    Add {
        /// Hours worked.
        effort: String,
        /// Day of the work (default: today).
        #[arg(long)]
        date: Option<String>,
        /// Project code.
        #[arg(long)]
        project: Option<String>,
        /// Status: submitted | approved | rejected | draft.
        #[arg(long, value_enum, default_value_t = RecordStatus::Draft)]
        status: RecordStatus,
        /// Free-text remarks.
        #[arg(long)]
        remarks: Option<String>,
        /// Record id (default: next numeric id).
        #[arg(long)]
        id: Option<String>,
    },

    /// Export the daily breakdown of a period to CSV.
    Export {
        #[command(flatten)]
        period: PeriodArgs,
        /// Output file path (default: timesheet_<period>.csv)
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Print the content hash of a period's records and the stored one.
    Hash {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Period selection shared by several commands. Defaults to the current week.
#[derive(Args, Debug, Clone)]
#[group(multiple = false)]
pub struct PeriodArgs {
    /// Any day of the week to use.
    #[arg(long)]
    pub week: Option<String>,
    /// Month to use, as YYYY-MM.
    #[arg(long)]
    pub month: Option<String>,
}

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub config: Config,
    pub today: NaiveDate,
    pub tracker: DismissalTracker<JsonFileStore>,
}

impl Context {
    pub fn new(config: Config, today: NaiveDate) -> Self {
        let store = Arc::new(JsonFileStore::new(config.state_path.clone()));
        Context {
            tracker: DismissalTracker::new(store),
            config,
            today,
        }
    }

    fn load_records(&self) -> Result<RecordSet> {
        RecordSet::load(&self.config.records_path)
            .with_context(|| format!("Failed to read records from {}", self.config.records_path.display()))
    }

    fn week_anchor(&self, day: Option<&str>) -> Result<PeriodAnchor> {
        let day = match day {
            Some(s) => match parse_day_input(s, self.today) {
                Some(d) => d,
                None => bail!("Invalid date '{}': use YYYY-MM-DD, DD-MMM-YYYY or today", s),
            },
            None => self.today,
        };
        Ok(PeriodAnchor::week_containing(day, self.config.week_start))
    }

    fn month_anchor(&self, month: Option<&str>) -> Result<PeriodAnchor> {
        match month {
            Some(s) => match parse_month_anchor(s) {
                Some((year, month)) => Ok(PeriodAnchor::month(year, month)),
                None => bail!("Invalid month '{}': use YYYY-MM", s),
            },
            None => Ok(PeriodAnchor::month_containing(self.today)),
        }
    }

    fn anchor(&self, period: &PeriodArgs) -> Result<PeriodAnchor> {
        match &period.month {
            Some(month) => self.month_anchor(Some(month)),
            None => self.week_anchor(period.week.as_deref()),
        }
    }

    /// Load records and aggregate `anchor`, failing if the period does not resolve.
    fn aggregate(&self, anchor: &PeriodAnchor) -> Result<(RecordSet, Aggregation, PeriodWindow)> {
        let set = self.load_records()?;
        let agg = aggregate(&set.records, anchor, self.today);
        let Some(window) = agg.window else {
            bail!("Period '{}' could not be resolved", anchor.text());
        };
        Ok((set, agg, window))
    }
}

/// Print the breakdown of a week.
pub async fn cmd_week(ctx: &Context, day: Option<String>, json: bool) -> Result<()> {
    let anchor = ctx.week_anchor(day.as_deref())?;
    show_period(ctx, &anchor, json).await
}

/// Print the breakdown of a month.
pub async fn cmd_month(ctx: &Context, month: Option<String>, json: bool) -> Result<()> {
    let anchor = ctx.month_anchor(month.as_deref())?;
    show_period(ctx, &anchor, json).await
}

async fn show_period(ctx: &Context, anchor: &PeriodAnchor, json: bool) -> Result<()> {
    let (set, agg, window) = ctx.aggregate(anchor)?;
    let period_records = records_in_window(&set.records, &window);
    let decision = ctx
        .tracker
        .evaluate(&window.key(), &period_records, agg.summary.exceeds_limit)
        .await;
    let violations = violations(&agg.summary);

    if json {
        let out = json!({
            "period": window.key(),
            "aggregation": agg,
            "violations": violations,
            "warning": decision,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", window.label());
    println!();
    print_days(&agg);
    println!();
    print_projects(&agg);
    println!();
    println!(
        "Total: {}h  Busiest day: {}h  Records: {}",
        format_hours(agg.summary.total_hours),
        format_hours(agg.summary.max_day_hours),
        agg.buckets.values().map(|b| b.tasks.len()).sum::<usize>()
    );
    if agg.skipped > 0 {
        println!("Skipped {} record(s) with unreadable dates.", agg.skipped);
    }

    if let Some(message) = warning_message(&violations) {
        println!();
        match decision {
            Some(WarningDecision { show: false, dismissed: true, .. }) => {
                println!("{} (dismissed)", message);
            }
            _ => {
                println!("WARNING: {}", message);
                println!("Run `tsheet dismiss {}` once reviewed.", period_flag(anchor));
            }
        }
    }
    Ok(())
}

/// Marker for days the aggregator listed as over the ceiling.
fn ceiling_flag(agg: &Aggregation, key: &str) -> &'static str {
    if agg.summary.exceeding_days.iter().any(|k| k == key) {
        " !"
    } else {
        ""
    }
}

/// Print the day table.
pub fn print_days(agg: &Aggregation) {
    println!(
        "{:<11} {:<4} {:>7} {:>6} {:<9} {}",
        "Date", "Day", "Hours", "Tasks", "S/A/R/D", "Projects"
    );
    for (key, bucket) in &agg.buckets {
        let counts = bucket.status_counts;
        let projects = bucket
            .projects
            .iter()
            .map(|p| if p.is_empty() { "-" } else { p.as_str() })
            .collect::<Vec<_>>()
            .join(",");
        let flag = ceiling_flag(agg, key);
        println!(
            "{:<11} {:<4} {:>7} {:>6} {:<9} {}{}",
            key,
            bucket.date.format("%a").to_string(),
            format_hours(bucket.total_hours),
            bucket.tasks.len(),
            format!("{}/{}/{}/{}", counts.submitted, counts.approved, counts.rejected, counts.draft),
            truncate(&projects, 40),
            flag
        );
    }
}

/// Print hours per project.
pub fn print_projects(agg: &Aggregation) {
    println!("{:<16} {:>7} {}", "Project", "Hours", "Tasks");
    for (project, total) in &agg.summary.project_totals {
        let name = if project.is_empty() { "-" } else { project.as_str() };
        println!(
            "{:<16} {:>7} {}",
            truncate(name, 16),
            format_hours(total.hours),
            total.task_count
        );
    }
}

/// Acknowledge the warning of a period.
pub async fn cmd_dismiss(ctx: &Context, period: PeriodArgs) -> Result<()> {
    let anchor = ctx.anchor(&period)?;
    let (set, agg, window) = ctx.aggregate(&anchor)?;
    if !agg.summary.exceeds_limit {
        println!("No day over {}h in {}; nothing to dismiss.", DAILY_CEILING_HOURS, window.label());
        return Ok(());
    }
    let period_records = records_in_window(&set.records, &window);
    ctx.tracker
        .acknowledge(&window.key(), &period_records)
        .await
        .context("Failed to save dismissal")?;
    println!("Warning dismissed for {}.", window.label());
    Ok(())
}

/// Forget the dismissal of a period.
pub async fn cmd_reset(ctx: &Context, period: PeriodArgs) -> Result<()> {
    let anchor = ctx.anchor(&period)?;
    let (_, _, window) = ctx.aggregate(&anchor)?;
    ctx.tracker
        .reset(&window.key())
        .await
        .context("Failed to reset dismissal")?;
    println!("Dismissal reset for {}.", window.label());
    Ok(())
}

/// Append a record to the record file.
pub fn cmd_add(
    ctx: &Context,
    effort: String,
    date: Option<String>,
    project: Option<String>,
    status: RecordStatus,
    remarks: Option<String>,
    id: Option<String>,
) -> Result<()> {
    let day = match date.as_deref() {
        Some(s) => match parse_day_input(s, ctx.today) {
            Some(d) => d,
            None => bail!("Invalid date '{}': use YYYY-MM-DD, DD-MMM-YYYY or today", s),
        },
        None => ctx.today,
    };
    let effort = effort.trim().to_string();
    if parse_effort(Some(&effort)) == 0.0 && effort.parse::<f64>().ok() != Some(0.0) {
        bail!("Invalid effort '{}': expected a non-negative number of hours", effort);
    }

    let mut set = ctx.load_records()?;
    let id = id.unwrap_or_else(|| set.next_id());
    let mut record = TaskRecord::new(id.clone(), format_record_date(day))
        .with_effort(effort)
        .with_status(status.code());
    record.project_code = project.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    record.remarks = remarks;

    set.push(record)?;
    set.save(&ctx.config.records_path)
        .with_context(|| format!("Failed to save records to {}", ctx.config.records_path.display()))?;
    println!("Added record {}", id);
    Ok(())
}

/// Export the daily breakdown of a period to CSV.
pub fn cmd_export(ctx: &Context, period: PeriodArgs, output: Option<String>) -> Result<()> {
    let anchor = ctx.anchor(&period)?;
    let (_, agg, window) = ctx.aggregate(&anchor)?;
    let output_path = PathBuf::from(output.unwrap_or_else(|| format!("timesheet_{}.csv", window.key())));

    // Escape CSV fields that contain commas or quotes
    let escape_csv = |s: &str| {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    };

    let mut csv_content = String::new();
    csv_content.push_str("Date,Day,Hours,Tasks,Submitted,Approved,Rejected,Draft,Projects,OverCeiling\n");
    for (key, bucket) in &agg.buckets {
        let counts = bucket.status_counts;
        let projects = bucket.projects.iter().cloned().collect::<Vec<_>>().join(";");
        csv_content.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            key,
            bucket.date.format("%a").to_string(),
            format_hours(bucket.total_hours),
            bucket.tasks.len(),
            counts.submitted,
            counts.approved,
            counts.rejected,
            counts.draft,
            escape_csv(&projects),
            agg.summary.exceeding_days.contains(key)
        ));
    }

    std::fs::write(&output_path, csv_content)
        .with_context(|| format!("Failed to write CSV file {}", output_path.display()))?;
    println!("Exported {} day(s) to {}", agg.buckets.len(), output_path.display());
    Ok(())
}

/// Print the content hash of a period's records next to the stored one.
pub async fn cmd_hash(ctx: &Context, period: PeriodArgs) -> Result<()> {
    let anchor = ctx.anchor(&period)?;
    let (set, _, window) = ctx.aggregate(&anchor)?;
    let current = content_hash(&records_in_window(&set.records, &window));
    let stored = ctx
        .tracker
        .store()
        .get(&hash_key(&window.key()))
        .await
        .context("Failed to read stored hash")?;
    println!("current: {}", current);
    println!("stored:  {}", stored.as_deref().unwrap_or("-"));
    Ok(())
}

pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

fn period_flag(anchor: &PeriodAnchor) -> String {
    match anchor {
        PeriodAnchor::Week(start) => format!("--week {}", start),
        PeriodAnchor::Month(month) => format!("--month {}", month),
    }
}

/// Format hours with up to two decimals, dropping trailing zeros.
pub fn format_hours(hours: f64) -> String {
    let s = format!("{:.2}", hours);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}
