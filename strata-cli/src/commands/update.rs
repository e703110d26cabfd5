//! `strata update` command - Render the delta script and record it.

use std::path::Path;

use crate::cli::UpdateArgs;
use crate::commands::build_engine;
use crate::config::ProjectConfig;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the update command
pub async fn run(config_path: Option<&Path>, args: UpdateArgs) -> CliResult<()> {
    let mut project = ProjectConfig::load(config_path)?;
    if args.dry_run {
        project.migration.updates.dry_run = true;
    }
    let dry_run = project.migration.updates.dry_run;

    let engine = build_engine(project.migration)?;
    if !dry_run {
        engine.initialize().await?;
    }

    let result = engine.update_database().await?;

    if dry_run {
        output::header("Update (dry run)");
        if !result.has_changes() {
            success("Database is up to date");
            return Ok(());
        }
        for (number, name) in result.executed_scripts.iter().enumerate() {
            output::numbered_item(number + 1, name);
        }
        for (old, new) in &result.renamed_scripts {
            output::list_item(&format!("rename {} -> {}", old, new));
        }
        for name in &result.removed_from_history {
            output::list_item(&format!("forget {}", name));
        }
        output::newline();
        output::info(&result.summary());
        return Ok(());
    }

    let delta = engine.executor().take();

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &delta).await?;
            success(&result.summary());
            if !delta.is_empty() {
                output::kv("Delta script", &path.display().to_string());
            }
        }
        None => {
            // stdout carries the delta script only
            print!("{}", delta);
            output::status(&result.summary());
        }
    }

    Ok(())
}
