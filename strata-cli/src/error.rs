//! CLI error types and result alias.

use miette::Diagnostic;
use strata_migrate::MigrationError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(strata::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(strata::config),
        help("check strata.toml or the file passed with --config")
    )]
    Config(String),

    /// Script could not be split into statements
    #[error("Parse error: {0}")]
    #[diagnostic(code(strata::parse))]
    Parse(String),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(strata::migration))]
    Migration(String),

    /// Irregular script updates block the update
    #[error("{0}")]
    #[diagnostic(
        code(strata::irregular),
        help("restore the original scripts or fix the database by hand")
    )]
    Irregular(String),

    /// Database error
    #[error("Database error: {0}")]
    #[diagnostic(code(strata::database))]
    Database(String),

    /// Command error
    #[error("Command error: {0}")]
    #[diagnostic(code(strata::command))]
    Command(String),
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Io(e) => CliError::Io(e),
            MigrationError::Parse { .. } => CliError::Parse(err.to_string()),
            MigrationError::IrregularScriptUpdates { .. } => CliError::Irregular(err.to_string()),
            MigrationError::Database(msg) => CliError::Database(msg),
            e if e.is_configuration_error() => CliError::Config(e.to_string()),
            e => CliError::Migration(e.to_string()),
        }
    }
}
