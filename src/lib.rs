//! # Strata
//!
//! Versioned SQL script migrations for Rust.
//!
//! Strata provides:
//! - Script ordering derived from file and folder names (`01_schema/02_users.sql`)
//! - Statement splitting for several SQL dialects, stored-program blocks included
//! - A comparison of the scripts with the execution history that refuses unsafe updates
//! - Pluggable execution history and SQL execution
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata::MigrationError> {
//!     let config = MigrationConfig::from_file("strata.toml")?;
//!     let history = FileExecutedScriptStore::new(&config.history.file);
//!     let engine = MigrationEngine::from_config(config, history, SqlScriptWriter::new())?;
//!
//!     let updates = engine.check_script_updates().await?;
//!     println!("{}", updates.summary());
//!
//!     let result = engine.update_database().await?;
//!     print!("{}", engine.executor().contents());
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The migration engine and its building blocks.
pub mod migrate {
    pub use strata_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Dialect, ExecutedScriptStore, FileExecutedScriptStore, InMemoryExecutedScriptStore,
        MigrationConfig, MigrationEngine, ScriptParser, ScriptUpdates, SqlExecutor,
        SqlScriptWriter,
    };
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationError};
