//! # tsheet - Timesheet summaries with overwork warnings
//!
//! A command-line front end over the `tsheet` library. It reads task records from a
//! local JSON file, prints weekly or monthly breakdowns, flags days above the 9-hour
//! ceiling and remembers per period when a warning has been acknowledged.
//!
//! ## Quick Start
//!
//! ```bash
//! # Record some work
//! tsheet add 6 --date 01-Jan-2025 --project ALPHA --status submitted
//! tsheet add 5 --date 01-Jan-2025 --project BETA
//!
//! # Show the week containing a day
//! tsheet week 2025-01-01
//!
//! # Acknowledge the warning for that week
//! tsheet dismiss --week 2025-01-01
//!
//! # Month view and CSV export
//! tsheet month 2025-01
//! tsheet export --month 2025-01 -o january.csv
//! ```
//!
//! Data lives in `~/.tsheet/` by default: `records.json` for records, `state.json` for
//! dismissals and an optional `config.yaml`.

use anyhow::Result;
use chrono::Local;
use clap::Parser;

use tsheet::config::Config;

mod cli;
mod cmd;
mod logging;

use cli::Cli;
use cmd::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log, cli.verbose)?;

    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return Ok(());
    }

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(records) = cli.records {
        config.records_path = records;
    }
    if let Some(state) = cli.state {
        config.state_path = state;
    }
    tracing::debug!(records = %config.records_path.display(), state = %config.state_path.display(), "Using data files");

    let ctx = Context::new(config, Local::now().date_naive());

    match cli.command {
        Commands::Week { day, json } => cmd_week(&ctx, day, json).await,
        Commands::Month { month, json } => cmd_month(&ctx, month, json).await,
        Commands::Dismiss { period } => cmd_dismiss(&ctx, period).await,
        Commands::Reset { period } => cmd_reset(&ctx, period).await,
        Commands::Add { effort, date, project, status, remarks, id } =>
            cmd_add(&ctx, effort, date, project, status, remarks, id),
        Commands::Export { period, output } => cmd_export(&ctx, period, output),
        Commands::Hash { period } => cmd_hash(&ctx, period).await,
        Commands::Completions { .. } => unreachable!("Completions command handled above"),
    }
}
