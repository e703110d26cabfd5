//! Error types for the migration engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation error.
    #[error("Database error: {0}")]
    Database(String),

    /// Execution history store error.
    #[error("History store error: {0}")]
    HistoryStore(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A qualifier that is not part of the qualifier registry.
    #[error("Script '{script}' uses unregistered qualifier '{qualifier}'")]
    UnregisteredQualifier {
        /// Script file name (or the config key for filter lists).
        script: String,
        /// The offending qualifier.
        qualifier: String,
    },

    /// A repeatable script placed inside an indexed folder.
    #[error(
        "Script '{0}' is repeatable but located in an indexed folder; \
         repeatable scripts must not have indexed parent folders"
    )]
    RepeatableScriptInIndexedFolder(String),

    /// No script file extensions were configured.
    #[error("No script file extensions configured")]
    NoScriptExtensions,

    /// The same script was found twice.
    #[error("Script '{file_name}' found in both '{first_location}' and '{second_location}'")]
    DuplicateScript {
        /// Script file name.
        file_name: String,
        /// Location where the script was first found.
        first_location: String,
        /// Location where the duplicate was found.
        second_location: String,
    },

    /// Two indexed scripts share the same index.
    #[error("Scripts '{first}' and '{second}' have the same index {indexes}")]
    DuplicateIndex {
        /// First script.
        first: String,
        /// Second script.
        second: String,
        /// The shared index, in canonical form.
        indexes: String,
    },

    /// Malformed script index.
    #[error("Invalid script index '{value}': {reason}")]
    InvalidIndexes {
        /// The rejected text.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A script targets a database that is not configured.
    #[error("Script '{script}' targets unknown database '{database}'")]
    UnknownTargetDatabase {
        /// Script file name.
        script: String,
        /// Target database name.
        database: String,
    },

    /// A script location does not exist.
    #[error("Script location '{0}' not found")]
    LocationNotFound(String),

    /// A script could not be split into statements.
    #[error("Parse error in script '{script}' at line {line}: {message}")]
    Parse {
        /// Script file name.
        script: String,
        /// Line where the offending statement starts.
        line: usize,
        /// Error description.
        message: String,
    },

    /// The repository diverged from the history in an unsafe way.
    #[error("Irregular script updates detected:\n{report}")]
    IrregularScriptUpdates {
        /// Human-readable list of the irregular updates.
        report: String,
    },

    /// A script failed during a previous update.
    #[error(
        "Script '{0}' failed during a previous update; fix the database and mark \
         the script as performed or reverted"
    )]
    PreviousScriptFailed(String),

    /// A statement of a script failed.
    #[error("Script '{script}' failed: {reason}\nStatement: {statement}")]
    ScriptExecutionFailed {
        /// Script file name.
        script: String,
        /// The failing statement.
        statement: String,
        /// Error reported by the executor.
        reason: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire migration lock: {0}")]
    LockFailed(String),

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a history store error.
    pub fn history_store(msg: impl Into<String>) -> Self {
        Self::HistoryStore(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid indexes error.
    pub fn invalid_indexes(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIndexes {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(script: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            script: script.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a lock failed error.
    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::LockFailed(msg.into())
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this error comes from invalid configuration or script layout.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnregisteredQualifier { .. }
                | Self::RepeatableScriptInIndexedFolder(_)
                | Self::NoScriptExtensions
                | Self::DuplicateScript { .. }
                | Self::DuplicateIndex { .. }
                | Self::InvalidIndexes { .. }
                | Self::UnknownTargetDatabase { .. }
                | Self::LocationNotFound(_)
        )
    }

    /// Check if this is a recoverable error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LockFailed(_))
    }
}
