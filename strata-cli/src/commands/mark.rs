//! `strata mark-*` commands - Fix up the execution history by hand.

use std::path::Path;

use crate::commands::load_engine;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run `strata mark-up-to-date`
pub async fn run_up_to_date(config_path: Option<&Path>) -> CliResult<()> {
    let engine = load_engine(config_path)?;
    engine.initialize().await?;

    let count = engine.mark_database_as_up_to_date().await?;
    success(&format!("Recorded {} scripts as executed", count));
    Ok(())
}

/// Run `strata mark-error-performed`
pub async fn run_error_performed(config_path: Option<&Path>) -> CliResult<()> {
    let engine = load_engine(config_path)?;
    let marked = engine.mark_error_script_performed().await?;
    report(&marked, "marked as performed");
    Ok(())
}

/// Run `strata mark-error-reverted`
pub async fn run_error_reverted(config_path: Option<&Path>) -> CliResult<()> {
    let engine = load_engine(config_path)?;
    let reverted = engine.mark_error_script_reverted().await?;
    report(&reverted, "marked as reverted");
    Ok(())
}

fn report(scripts: &[String], verb: &str) {
    if scripts.is_empty() {
        output::info("No failed scripts in the history");
        return;
    }
    for name in scripts {
        output::list_item(name);
    }
    success(&format!("{} script(s) {}", scripts.len(), verb));
}
