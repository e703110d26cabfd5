//! CLI configuration handling.

use std::path::{Path, PathBuf};

use strata_migrate::MigrationConfig;

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// A loaded project configuration.
///
/// Relative script locations and the history file are resolved against the
/// directory holding the configuration file, so `strata` behaves the same
/// from any working directory.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// The file the configuration was read from.
    pub path: PathBuf,
    /// The migration configuration, paths resolved.
    pub migration: MigrationConfig,
}

impl ProjectConfig {
    /// Load the configuration from `path`, or `strata.toml` in the working directory.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir()?.join(CONFIG_FILE_NAME),
        };

        if !path.exists() {
            return Err(CliError::Config(format!(
                "{} not found. Create one or pass --config <path>",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let migration = Self::parse(&content, &base)?;

        tracing::debug!(config = %path.display(), "loaded configuration");
        Ok(Self { path, migration })
    }

    /// Load the configuration if one exists, for commands that can do without.
    pub fn load_optional(path: Option<&Path>) -> CliResult<Option<Self>> {
        match path {
            Some(path) => Self::load(Some(path)).map(Some),
            None => {
                let default = std::env::current_dir()?.join(CONFIG_FILE_NAME);
                if default.exists() {
                    Self::load(Some(&default)).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Parse configuration text, resolving relative paths against `base`.
    pub fn parse(content: &str, base: &Path) -> CliResult<MigrationConfig> {
        let mut config: MigrationConfig = toml::from_str(content)?;
        config.validate()?;

        for location in &mut config.scripts.locations {
            *location = resolve(base, location);
        }
        config.history.file = resolve(base, &config.history.file);

        if config.scripts.locations.is_empty() {
            return Err(CliError::Config(
                "no script locations configured; set [scripts] locations".to_string(),
            ));
        }
        Ok(config)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
