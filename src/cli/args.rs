use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "drivemaster")]
#[command(about = "Audit, bulk-edit and roll back Google Drive sharing permissions")]
pub struct Args {
    /// Path to the config file (defaults to ./drivemaster.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write a daily-rolling log file into this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Do not ask for confirmation before live runs
    #[arg(long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: crate::Command,
}
