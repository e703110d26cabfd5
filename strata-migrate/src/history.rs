//! Execution history.
//!
//! The history remembers which scripts ran, with which content and whether
//! they succeeded. Records are persisted by an [`ExecutedScriptStore`] and
//! turned back into scripts with the same [`ScriptFactory`] the repository
//! uses, so both sides agree on identity.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::script::{Script, ScriptFactory};

/// A persisted history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedScriptRecord {
    /// Script file name.
    pub file_name: String,
    /// Modification time of the script file when it ran, epoch milliseconds.
    pub file_last_modified_at: i64,
    /// Checksum of the content that ran.
    pub checksum: String,
    /// When the script ran.
    pub executed_at: DateTime<Utc>,
    /// Whether every statement succeeded.
    pub succeeded: bool,
}

impl ExecutedScriptRecord {
    /// Record for `script` executed now.
    pub fn new(script: &Script, succeeded: bool) -> Self {
        Self {
            file_name: script.file_name().to_string(),
            file_last_modified_at: script.last_modified_at(),
            checksum: script.checksum().to_string(),
            executed_at: Utc::now(),
            succeeded,
        }
    }
}

/// A script together with the outcome of its execution.
#[derive(Debug, Clone)]
pub struct ExecutedScript {
    script: Script,
    executed_at: DateTime<Utc>,
    succeeded: bool,
}

impl ExecutedScript {
    /// Create an executed script.
    pub fn new(script: Script, executed_at: DateTime<Utc>, succeeded: bool) -> Self {
        Self {
            script,
            executed_at,
            succeeded,
        }
    }

    /// Rebuild from a persisted record.
    pub fn from_record(factory: &ScriptFactory, record: &ExecutedScriptRecord) -> MigrateResult<Self> {
        let script = factory.create_with_checksum(
            &record.file_name,
            record.file_last_modified_at,
            record.checksum.clone(),
        )?;
        Ok(Self::new(script, record.executed_at, record.succeeded))
    }

    /// The script as it was when it ran.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// When it ran.
    pub fn executed_at(&self) -> DateTime<Utc> {
        self.executed_at
    }

    /// Whether it succeeded.
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// The same execution under a new identity.
    pub fn renamed_to(&self, script: Script) -> Self {
        Self {
            script,
            executed_at: self.executed_at,
            succeeded: self.succeeded,
        }
    }

    /// Persistable form.
    pub fn to_record(&self) -> ExecutedScriptRecord {
        ExecutedScriptRecord {
            file_name: self.script.file_name().to_string(),
            file_last_modified_at: self.script.last_modified_at(),
            checksum: self.script.checksum().to_string(),
            executed_at: self.executed_at,
            succeeded: self.succeeded,
        }
    }
}

impl PartialEq for ExecutedScript {
    fn eq(&self, other: &Self) -> bool {
        self.script == other.script
    }
}

impl Eq for ExecutedScript {}

impl Ord for ExecutedScript {
    fn cmp(&self, other: &Self) -> Ordering {
        self.script.cmp(&other.script)
    }
}

impl PartialOrd for ExecutedScript {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Persistence of the execution history.
#[async_trait::async_trait]
pub trait ExecutedScriptStore: Send + Sync {
    /// Prepare the store.
    async fn initialize(&self) -> MigrateResult<()>;

    /// Every record.
    async fn list(&self) -> MigrateResult<Vec<ExecutedScriptRecord>>;

    /// Insert or replace the record with the same file name.
    async fn upsert(&self, record: ExecutedScriptRecord) -> MigrateResult<()>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, file_name: &str) -> MigrateResult<bool>;

    /// Remove every record.
    async fn clear(&self) -> MigrateResult<()>;

    /// Acquire an exclusive lock for updates.
    async fn acquire_lock(&self) -> MigrateResult<MigrationLock>;
}

/// Update lock, released on drop.
pub struct MigrationLock {
    lock_id: i64,
    release_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl MigrationLock {
    /// Create a lock that runs `release` when dropped.
    pub fn new(lock_id: i64, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            lock_id,
            release_fn: Some(Box::new(release)),
        }
    }

    /// Get the lock ID.
    pub fn id(&self) -> i64 {
        self.lock_id
    }
}

impl std::fmt::Debug for MigrationLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationLock").field("lock_id", &self.lock_id).finish()
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if let Some(release) = self.release_fn.take() {
            release();
        }
    }
}

static NEXT_LOCK_ID: AtomicI64 = AtomicI64::new(1);

fn next_lock_id() -> i64 {
    NEXT_LOCK_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// History kept in memory. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutedScriptStore {
    records: Arc<Mutex<BTreeMap<String, ExecutedScriptRecord>>>,
    locked: Arc<AtomicBool>,
}

impl InMemoryExecutedScriptStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with records.
    pub fn with_records(records: impl IntoIterator<Item = ExecutedScriptRecord>) -> Self {
        let store = Self::default();
        {
            let mut map = store.records.lock();
            for record in records {
                map.insert(record.file_name.clone(), record);
            }
        }
        store
    }

    /// Look up a record.
    pub fn get(&self, file_name: &str) -> Option<ExecutedScriptRecord> {
        self.records.lock().get(file_name).cloned()
    }

    /// Whether the update lock is held.
    pub fn is_locked(&self) -> bool {
        self.locked.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ExecutedScriptStore for InMemoryExecutedScriptStore {
    async fn initialize(&self) -> MigrateResult<()> {
        Ok(())
    }

    async fn list(&self) -> MigrateResult<Vec<ExecutedScriptRecord>> {
        Ok(self.records.lock().values().cloned().collect())
    }

    async fn upsert(&self, record: ExecutedScriptRecord) -> MigrateResult<()> {
        self.records.lock().insert(record.file_name.clone(), record);
        Ok(())
    }

    async fn delete(&self, file_name: &str) -> MigrateResult<bool> {
        Ok(self.records.lock().remove(file_name).is_some())
    }

    async fn clear(&self) -> MigrateResult<()> {
        self.records.lock().clear();
        Ok(())
    }

    async fn acquire_lock(&self) -> MigrateResult<MigrationLock> {
        if self.locked.swap(true, AtomicOrdering::SeqCst) {
            return Err(MigrationError::lock_failed("update already in progress"));
        }
        let locked = Arc::clone(&self.locked);
        Ok(MigrationLock::new(next_lock_id(), move || {
            locked.store(false, AtomicOrdering::SeqCst);
        }))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    scripts: Vec<ExecutedScriptRecord>,
}

/// History persisted to a TOML file.
///
/// The lock is a `<file>.lock` marker created next to the history file, so
/// it also guards against a second process.
#[derive(Debug)]
pub struct FileExecutedScriptStore {
    path: PathBuf,
    io: tokio::sync::Mutex<()>,
}

impl FileExecutedScriptStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: tokio::sync::Mutex::new(()),
        }
    }

    /// Path of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    async fn load(&self) -> MigrateResult<BTreeMap<String, ExecutedScriptRecord>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(BTreeMap::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MigrationError::history_store(format!("Failed to read history file: {}", e))
        })?;
        let file: HistoryFile = toml::from_str(&content).map_err(|e| {
            MigrationError::history_store(format!("Failed to parse history file: {}", e))
        })?;

        Ok(file
            .scripts
            .into_iter()
            .map(|r| (r.file_name.clone(), r))
            .collect())
    }

    async fn save(&self, records: &BTreeMap<String, ExecutedScriptRecord>) -> MigrateResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MigrationError::history_store(format!("Failed to create directory: {}", e))
            })?;
        }

        let file = HistoryFile {
            scripts: records.values().cloned().collect(),
        };
        let content = toml::to_string_pretty(&file).map_err(|e| {
            MigrationError::history_store(format!("Failed to serialize history: {}", e))
        })?;

        let content = format!(
            "# Strata execution history\n\
             # Written by strata; use the mark-* commands instead of editing it\n\n\
             {}",
            content
        );

        // write aside and rename so a crash never leaves a truncated history
        let temp = self.temp_path();
        tokio::fs::write(&temp, content).await.map_err(|e| {
            MigrationError::history_store(format!("Failed to write history file: {}", e))
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            MigrationError::history_store(format!("Failed to replace history file: {}", e))
        })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ExecutedScriptStore for FileExecutedScriptStore {
    async fn initialize(&self) -> MigrateResult<()> {
        let _guard = self.io.lock().await;
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            self.save(&BTreeMap::new()).await?;
            tracing::info!(path = %self.path.display(), "created history file");
        }
        Ok(())
    }

    async fn list(&self) -> MigrateResult<Vec<ExecutedScriptRecord>> {
        let _guard = self.io.lock().await;
        Ok(self.load().await?.into_values().collect())
    }

    async fn upsert(&self, record: ExecutedScriptRecord) -> MigrateResult<()> {
        let _guard = self.io.lock().await;
        let mut records = self.load().await?;
        records.insert(record.file_name.clone(), record);
        self.save(&records).await
    }

    async fn delete(&self, file_name: &str) -> MigrateResult<bool> {
        let _guard = self.io.lock().await;
        let mut records = self.load().await?;
        let existed = records.remove(file_name).is_some();
        if existed {
            self.save(&records).await?;
        }
        Ok(existed)
    }

    async fn clear(&self) -> MigrateResult<()> {
        let _guard = self.io.lock().await;
        self.save(&BTreeMap::new()).await
    }

    async fn acquire_lock(&self) -> MigrateResult<MigrationLock> {
        let lock_path = self.lock_path();
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .await;

        match created {
            Ok(_) => Ok(MigrationLock::new(next_lock_id(), move || {
                if let Err(e) = std::fs::remove_file(&lock_path) {
                    tracing::warn!(path = %lock_path.display(), error = %e, "failed to remove lock file");
                }
            })),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(MigrationError::lock_failed(
                format!("lock file '{}' exists; remove it if no update is running", lock_path.display()),
            )),
            Err(e) => Err(MigrationError::lock_failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptConfig;
    use pretty_assertions::assert_eq;

    fn record(file_name: &str, succeeded: bool) -> ExecutedScriptRecord {
        ExecutedScriptRecord {
            file_name: file_name.to_string(),
            file_last_modified_at: 1_000,
            checksum: "abc123".to_string(),
            executed_at: Utc::now(),
            succeeded,
        }
    }

    #[test]
    fn test_record_from_script() {
        let factory = ScriptFactory::new(&ScriptConfig::default()).unwrap();
        let script = factory.create("01_init/01_users.sql", 42, "CREATE TABLE users();").unwrap();
        let record = ExecutedScriptRecord::new(&script, true);

        assert_eq!(record.file_name, "01_init/01_users.sql");
        assert_eq!(record.file_last_modified_at, 42);
        assert_eq!(record.checksum, script.checksum());
    }

    #[test]
    fn test_executed_script_round_trips_identity() {
        let factory = ScriptFactory::new(&ScriptConfig::default()).unwrap();
        let record = record("02_views/v.sql", false);
        let executed = ExecutedScript::from_record(&factory, &record).unwrap();

        assert_eq!(executed.script().checksum(), "abc123");
        assert!(executed.script().is_incremental_script());
        assert!(!executed.succeeded());
        assert_eq!(executed.to_record(), record);
    }

    #[test]
    fn test_renamed_to_keeps_outcome() {
        let factory = ScriptFactory::new(&ScriptConfig::default()).unwrap();
        let executed = ExecutedScript::from_record(&factory, &record("01_a.sql", true)).unwrap();
        let target = factory.renamed(executed.script(), "03_a.sql").unwrap();
        let renamed = executed.renamed_to(target);

        assert_eq!(renamed.script().file_name(), "03_a.sql");
        assert_eq!(renamed.executed_at(), executed.executed_at());
        assert!(renamed.succeeded());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryExecutedScriptStore::new();
        store.upsert(record("01_a.sql", true)).await.unwrap();
        store.upsert(record("02_b.sql", false)).await.unwrap();
        store.upsert(record("02_b.sql", true)).await.unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(store.get("02_b.sql").unwrap().succeeded);

        assert!(store.delete("01_a.sql").await.unwrap());
        assert!(!store.delete("01_a.sql").await.unwrap());

        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_lock() {
        let store = InMemoryExecutedScriptStore::new();
        let lock = store.acquire_lock().await.unwrap();
        assert!(store.is_locked());
        assert!(store.acquire_lock().await.unwrap_err().is_recoverable());

        drop(lock);
        assert!(!store.is_locked());
        assert!(store.acquire_lock().await.is_ok());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileExecutedScriptStore::new(dir.path().join("history.toml"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.toml");

        let store = FileExecutedScriptStore::new(&path);
        store.initialize().await.unwrap();
        store.upsert(record("01_a.sql", true)).await.unwrap();
        store.upsert(record("repeatable/v.sql", false)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[[scripts]]"));

        let reopened = FileExecutedScriptStore::new(&path);
        let mut names: Vec<_> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["01_a.sql", "repeatable/v.sql"]);

        assert!(reopened.delete("01_a.sql").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_replaces_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.toml");
        std::fs::write(dir.path().join("history.toml.tmp"), "left over").unwrap();

        let store = FileExecutedScriptStore::new(&path);
        store.upsert(record("01_a.sql", true)).await.unwrap();
        store.upsert(record("02_b.sql", true)).await.unwrap();

        assert!(!dir.path().join("history.toml.tmp").exists());
        assert_eq!(store.list().await.unwrap().len(), 2);

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["history.toml"]);
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.toml");
        std::fs::write(&path, "scripts = 3").unwrap();

        let err = FileExecutedScriptStore::new(&path).list().await.unwrap_err();
        assert!(matches!(err, MigrationError::HistoryStore(_)));
    }

    #[tokio::test]
    async fn test_file_store_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileExecutedScriptStore::new(dir.path().join("history.toml"));

        let lock = store.acquire_lock().await.unwrap();
        assert!(dir.path().join("history.toml.lock").exists());
        assert!(matches!(
            store.acquire_lock().await.unwrap_err(),
            MigrationError::LockFailed(_)
        ));

        drop(lock);
        assert!(!dir.path().join("history.toml.lock").exists());
    }
}
