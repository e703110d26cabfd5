//! Migration configuration.
//!
//! The configuration is usually read from a `strata.toml` file but every
//! section can also be built in code:
//!
//! ```rust
//! use strata_migrate::{Dialect, MigrationConfig};
//!
//! let config = MigrationConfig::new()
//!     .location("db/scripts")
//!     .dialect(Dialect::Oracle)
//!     .baseline_revision("1.2")
//!     .allow_out_of_sequence_patches(true);
//!
//! assert_eq!(config.parser.dialect, Dialect::Oracle);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::indexes::ScriptIndexes;
use crate::parser::Dialect;

/// Default history file name.
pub const DEFAULT_HISTORY_FILE: &str = "strata-history.toml";

/// Complete migration configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Script discovery and identity settings.
    pub scripts: ScriptConfig,
    /// Statement splitting settings.
    pub parser: ParserConfig,
    /// Update policy.
    pub updates: UpdateConfig,
    /// Execution history settings.
    pub history: HistoryConfig,
    /// Logical database names scripts may target. Empty means any.
    pub databases: Vec<String>,
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> MigrateResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MigrationError::config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot check on its own.
    pub fn validate(&self) -> MigrateResult<()> {
        if self.scripts.extensions.is_empty() {
            return Err(MigrationError::NoScriptExtensions);
        }
        let separator = self.scripts.index_separator;
        let prefixes = [
            self.scripts.qualifier_prefix,
            self.scripts.target_database_prefix,
        ];
        if prefixes.contains(&separator) || prefixes[0] == prefixes[1] {
            return Err(MigrationError::config(
                "index separator, qualifier prefix and target database prefix must differ",
            ));
        }
        if self.scripts.preprocessing_dir == self.scripts.postprocessing_dir {
            return Err(MigrationError::config(
                "preprocessing and postprocessing directories must differ",
            ));
        }
        Ok(())
    }

    /// Add a script location.
    pub fn location(mut self, path: impl Into<PathBuf>) -> Self {
        self.scripts.locations.push(path.into());
        self
    }

    /// Set the script file extensions.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Register qualifiers.
    pub fn qualifiers<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts.qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the patch qualifiers.
    pub fn patch_qualifiers<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts.patch_qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }

    /// Only keep scripts carrying one of these qualifiers.
    pub fn included_qualifiers<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts.included_qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }

    /// Drop scripts carrying one of these qualifiers.
    pub fn excluded_qualifiers<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts.excluded_qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the baseline revision, in canonical form (`1.2`).
    pub fn baseline_revision(mut self, baseline: impl Into<String>) -> Self {
        self.scripts.baseline_revision = Some(baseline.into());
        self
    }

    /// Set the SQL dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.parser.dialect = dialect;
        self
    }

    /// Override the dialect's backslash escaping default.
    pub fn backslash_escaping(mut self, enabled: bool) -> Self {
        self.parser.backslash_escaping = Some(enabled);
        self
    }

    /// Add a `${name}` substitution parameter.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parser.parameters.insert(name.into(), value.into());
        self
    }

    /// Allow patch scripts to run out of index order.
    pub fn allow_out_of_sequence_patches(mut self, allow: bool) -> Self {
        self.updates.allow_out_of_sequence_patches = allow;
        self
    }

    /// Ignore deleted scripts instead of reporting them.
    pub fn ignore_deletions(mut self, ignore: bool) -> Self {
        self.updates.ignore_deletions = ignore;
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.updates.dry_run = dry_run;
        self
    }

    /// Set the history file path.
    pub fn history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history.file = path.into();
        self
    }

    /// Set the databases scripts may target.
    pub fn databases<I, S>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.databases = databases.into_iter().map(Into::into).collect();
        self
    }
}

/// Script discovery and identity settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Directories scanned for scripts.
    pub locations: Vec<PathBuf>,
    /// File extensions of scripts, without the dot.
    pub extensions: Vec<String>,
    /// Separates the index, qualifiers and name inside a path segment.
    pub index_separator: char,
    /// Marks a qualifier token (`#patch`).
    pub qualifier_prefix: char,
    /// Marks a target database token (`@audit`).
    pub target_database_prefix: char,
    /// Registered qualifiers.
    pub qualifiers: Vec<String>,
    /// Qualifiers that make a script a patch script.
    pub patch_qualifiers: Vec<String>,
    /// When non-empty, only scripts with one of these qualifiers are kept.
    pub included_qualifiers: Vec<String>,
    /// Scripts with one of these qualifiers are dropped.
    pub excluded_qualifiers: Vec<String>,
    /// Directory name holding pre-processing scripts.
    pub preprocessing_dir: String,
    /// Directory name holding post-processing scripts.
    pub postprocessing_dir: String,
    /// Indexed scripts sorting below this revision are ignored.
    pub baseline_revision: Option<String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            extensions: vec!["sql".to_string(), "ddl".to_string()],
            index_separator: '_',
            qualifier_prefix: '#',
            target_database_prefix: '@',
            qualifiers: Vec::new(),
            patch_qualifiers: vec!["patch".to_string()],
            included_qualifiers: Vec::new(),
            excluded_qualifiers: Vec::new(),
            preprocessing_dir: "preprocessing".to_string(),
            postprocessing_dir: "postprocessing".to_string(),
            baseline_revision: None,
        }
    }
}

impl ScriptConfig {
    /// Every registered qualifier, lower-cased, patch qualifiers included.
    pub fn registered_qualifiers(&self) -> BTreeSet<String> {
        self.qualifiers
            .iter()
            .chain(self.patch_qualifiers.iter())
            .map(|q| q.to_lowercase())
            .collect()
    }

    /// The parsed baseline revision.
    pub fn baseline(&self) -> MigrateResult<Option<ScriptIndexes>> {
        self.baseline_revision
            .as_deref()
            .map(str::parse)
            .transpose()
    }
}

/// Statement splitting settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// SQL dialect.
    pub dialect: Dialect,
    /// Overrides the dialect's backslash escaping default.
    pub backslash_escaping: Option<bool>,
    /// `${name}` substitution parameters.
    pub parameters: BTreeMap<String, String>,
}

impl ParserConfig {
    /// Whether backslash escaping is active.
    pub fn backslash_escaping_enabled(&self) -> bool {
        self.backslash_escaping
            .unwrap_or_else(|| self.dialect.backslash_escaping())
    }
}

/// Update policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Run lower-index patch scripts instead of reporting them.
    pub allow_out_of_sequence_patches: bool,
    /// Move deleted scripts to the ignored bucket.
    pub ignore_deletions: bool,
    /// Analyze and list without executing.
    pub dry_run: bool,
}

/// Execution history settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// File used by the file-backed history store.
    pub file: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_HISTORY_FILE),
        }
    }
}
