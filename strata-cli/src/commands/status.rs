//! `strata status` command - Compare the scripts with the execution history.

use std::path::Path;

use crate::commands::load_engine;
use crate::error::CliResult;
use crate::output::{self, kv, success, warn};

/// Run the status command
pub async fn run(config_path: Option<&Path>) -> CliResult<()> {
    output::header("Status");

    let engine = load_engine(config_path)?;
    let config = engine.config();

    let locations = config
        .scripts
        .locations
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>();
    kv("Scripts", &locations.join(", "));
    kv("History", &config.history.file.display().to_string());
    kv("Dialect", config.parser.dialect.as_str());
    output::newline();

    let status = engine.status().await?;
    let updates = &status.updates;

    kv("Executed", &status.executed.len().to_string());
    kv("Pending", &status.pending.len().to_string());
    output::newline();

    if status.is_up_to_date() {
        success("Database is up to date");
        return Ok(());
    }

    if !status.failed.is_empty() {
        output::section("Failed scripts");
        for name in &status.failed {
            output::list_item(&output::style_error(name));
        }
        output::dim("  Run `strata mark-error-performed` or `strata mark-error-reverted`");
        output::newline();
    }

    if updates.has_regular_updates() {
        output::section("Regular updates");
        for update in updates.regular_updates() {
            output::list_item(&output::style_pending(&update.to_string()));
        }
        output::newline();
    }

    if updates.has_irregular_updates() {
        output::section("Irregular updates");
        for update in updates.irregular_updates() {
            output::list_item(&output::style_error(&update.to_string()));
        }
        output::newline();
        warn("Irregular updates block `strata update`");
        output::newline();
    }

    if updates.has_ignored_scripts() {
        output::section("Ignored scripts");
        for update in updates.ignored_scripts() {
            output::list_item(&update.to_string());
        }
        output::newline();
    }

    output::info(&updates.summary());
    Ok(())
}
