//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Strata - versioned SQL script migrations
#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Strata CLI - versioned SQL script migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./strata.toml)
    #[arg(short, long, global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show pending, irregular and ignored script updates
    Status,

    /// Bring the database up to date, writing the delta script
    Update(UpdateArgs),

    /// Record every current script as executed without running anything
    MarkUpToDate,

    /// Mark failed scripts as performed after finishing them by hand
    MarkErrorPerformed,

    /// Forget failed scripts after undoing them by hand
    MarkErrorReverted,

    /// Print the statements of a single script
    Split(SplitArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Update Command
// =============================================================================

/// Arguments for the `update` command
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// List what would run without executing or recording anything
    #[arg(long)]
    pub dry_run: bool,

    /// Write the delta script to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// =============================================================================
// Split Command
// =============================================================================

/// Arguments for the `split` command
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Script to split
    pub file: PathBuf,

    /// SQL dialect (generic, oracle, db2, postgresql, mysql, informix)
    #[arg(short, long)]
    pub dialect: Option<String>,
}
