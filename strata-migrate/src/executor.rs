//! SQL execution.
//!
//! The engine never talks to a database directly. It hands statements to a
//! [`SqlExecutor`], one script per transaction.

use parking_lot::Mutex;

use crate::error::MigrateResult;
use crate::script::Script;

/// Runs statements against a database.
#[async_trait::async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Called before the first statement of every script.
    async fn start_script(&self, _script: &Script) -> MigrateResult<()> {
        Ok(())
    }

    /// Open a transaction.
    async fn begin(&self, _target_database: Option<&str>) -> MigrateResult<()> {
        Ok(())
    }

    /// Execute one statement.
    async fn execute(&self, target_database: Option<&str>, statement: &str) -> MigrateResult<()>;

    /// Commit the open transaction.
    async fn commit(&self, _target_database: Option<&str>) -> MigrateResult<()> {
        Ok(())
    }

    /// Roll back the open transaction.
    async fn rollback(&self, _target_database: Option<&str>) -> MigrateResult<()> {
        Ok(())
    }
}

/// Collects statements into a delta script instead of running them.
#[derive(Debug, Default)]
pub struct SqlScriptWriter {
    buffer: Mutex<String>,
}

impl SqlScriptWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The script written so far.
    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Take the script, leaving the writer empty.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.lock())
    }
}

#[async_trait::async_trait]
impl SqlExecutor for SqlScriptWriter {
    async fn start_script(&self, script: &Script) -> MigrateResult<()> {
        let mut buffer = self.buffer.lock();
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        match script.target_database() {
            Some(database) => {
                buffer.push_str(&format!("-- script: {} (database: {})\n", script, database))
            }
            None => buffer.push_str(&format!("-- script: {}\n", script)),
        }
        Ok(())
    }

    async fn execute(&self, _target_database: Option<&str>, statement: &str) -> MigrateResult<()> {
        let mut buffer = self.buffer.lock();
        // block statements keep their trailing newline
        if statement.ends_with('\n') {
            buffer.push_str(statement);
            buffer.push_str("/\n");
        } else {
            buffer.push_str(statement);
            buffer.push_str(";\n");
        }
        Ok(())
    }
}
