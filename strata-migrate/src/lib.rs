//! # strata-migrate
//!
//! Migration engine for Strata.
//!
//! This crate provides functionality for:
//! - Deriving script identity (index, qualifiers, role) from script paths
//! - Splitting scripts into statements, including stored-program blocks
//! - Comparing the scripts with the execution history
//! - Applying the safe updates, one transaction per script
//!
//! ## Architecture
//!
//! Scripts are read from one or more locations and bucketed by the
//! repository. The analyzer compares them with the execution history and
//! the engine applies whatever is regular.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │  Locations   │────▶│   Repository   │────▶│   Analyzer   │
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                                                    ▲   │
//!                      ┌────────────────┐            │   ▼
//!                      │    History     │────────────┘ ┌──────────────┐
//!                      └────────────────┘◀─────────────│    Engine    │
//!                                                      └──────────────┘
//!                                                             │
//!                                                             ▼
//!                                                      ┌──────────────┐
//!                                                      │ SqlExecutor  │
//!                                                      └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata_migrate::{
//!     FileExecutedScriptStore, MigrationConfig, MigrationEngine, SqlScriptWriter,
//! };
//!
//! # async fn run() -> strata_migrate::MigrateResult<()> {
//! let config = MigrationConfig::new().location("db/scripts");
//! let history = FileExecutedScriptStore::new(&config.history.file);
//! let engine = MigrationEngine::from_config(config, history, SqlScriptWriter::new())?;
//!
//! engine.initialize().await?;
//! let result = engine.update_database().await?;
//! println!("{}", result.summary());
//! print!("{}", engine.executor().contents());
//! # Ok(())
//! # }
//! ```
//!
//! ## Script Layout
//!
//! ```text
//! db/scripts/
//! ├── 01_schema/
//! │   ├── 01_tables.sql          # incremental, index 1.1
//! │   └── 02_#patch_fix.sql      # patch script, index 1.2
//! ├── 02_@audit_audit.sql        # runs against the `audit` database
//! ├── views/users.sql            # repeatable
//! ├── preprocessing/disable.sql  # runs before every update
//! └── postprocessing/grants.sql  # runs after every update
//! ```

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod history;
pub mod indexes;
pub mod location;
pub mod parser;
pub mod repository;
pub mod script;

// Re-exports
pub use analyzer::{ScriptUpdate, ScriptUpdateType, ScriptUpdates, ScriptUpdatesAnalyzer};
pub use config::{
    DEFAULT_HISTORY_FILE, HistoryConfig, MigrationConfig, ParserConfig, ScriptConfig, UpdateConfig,
};
pub use engine::{MigrationEngine, MigrationStatus, UpdateResult};
pub use error::{MigrateResult, MigrationError};
pub use executor::{SqlExecutor, SqlScriptWriter};
pub use history::{
    ExecutedScript, ExecutedScriptRecord, ExecutedScriptStore, FileExecutedScriptStore,
    InMemoryExecutedScriptStore, MigrationLock,
};
pub use indexes::ScriptIndexes;
pub use location::{FileSystemLocation, InMemoryLocation, ScriptLocation, ScriptSource};
pub use parser::{Dialect, ScriptParser, ScriptParserFactory};
pub use repository::{QualifierFilter, ScriptRepository};
pub use script::{Script, ScriptFactory, compute_checksum};
