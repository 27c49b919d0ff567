use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// File-backed timesheet CLI.
/// Records default to ~/.tsheet/records.json or a path passed via --records.
#[derive(Parser)]
#[command(name = "tsheet", version, about = "Weekly and monthly timesheet summaries with overwork warnings")]
pub struct Cli {
    /// Path to the JSON records file.
    #[arg(long, global = true)]
    pub records: Option<PathBuf>,

    /// Path to the JSON file holding warning dismissals.
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Path to a YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output: off | stdout | stderr | <file path>.
    #[arg(long, global = true, default_value = "stderr")]
    pub log: String,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
