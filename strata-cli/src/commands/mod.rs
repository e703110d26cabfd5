//! CLI command implementations.

pub mod mark;
pub mod split;
pub mod status;
pub mod update;
pub mod version;

use std::path::Path;

use strata_migrate::{FileExecutedScriptStore, MigrationConfig, MigrationEngine, SqlScriptWriter};

use crate::config::ProjectConfig;
use crate::error::CliResult;

/// Engine over the configured script directories and history file.
pub(crate) type FileEngine = MigrationEngine<FileExecutedScriptStore, SqlScriptWriter>;

/// Build the engine for a loaded configuration.
pub(crate) fn build_engine(config: MigrationConfig) -> CliResult<FileEngine> {
    let history = FileExecutedScriptStore::new(&config.history.file);
    Ok(MigrationEngine::from_config(config, history, SqlScriptWriter::new())?)
}

/// Load the configuration and build the engine in one step.
pub(crate) fn load_engine(config_path: Option<&Path>) -> CliResult<FileEngine> {
    let project = ProjectConfig::load(config_path)?;
    build_engine(project.migration)
}
