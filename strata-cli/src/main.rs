//! Strata CLI - Command-line interface for Strata SQL script migrations.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use strata_cli::cli::{Cli, Command};
use strata_cli::commands;
use strata_cli::error::CliResult;
use strata_cli::output;

#[tokio::main]
async fn main() {
    // Run the CLI and handle errors
    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Run the appropriate command
    match cli.command {
        Command::Status => commands::status::run(cli.config.as_deref()).await,
        Command::Update(args) => commands::update::run(cli.config.as_deref(), args).await,
        Command::MarkUpToDate => commands::mark::run_up_to_date(cli.config.as_deref()).await,
        Command::MarkErrorPerformed => {
            commands::mark::run_error_performed(cli.config.as_deref()).await
        }
        Command::MarkErrorReverted => {
            commands::mark::run_error_reverted(cli.config.as_deref()).await
        }
        Command::Split(args) => commands::split::run(cli.config.as_deref(), args).await,
        Command::Version => commands::version::run().await,
    }
}

/// Log to stderr so the delta script on stdout stays clean.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
