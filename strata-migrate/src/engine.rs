//! Migration engine implementation.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use crate::analyzer::{ScriptUpdateType, ScriptUpdates, ScriptUpdatesAnalyzer};
use crate::config::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::SqlExecutor;
use crate::history::{ExecutedScript, ExecutedScriptRecord, ExecutedScriptStore};
use crate::location::{FileSystemLocation, ScriptLocation};
use crate::parser::ScriptParserFactory;
use crate::repository::ScriptRepository;
use crate::script::{Script, ScriptFactory};

/// Result of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Scripts executed (or, on a dry run, that would be), in execution order.
    pub executed_scripts: Vec<String>,
    /// History entries moved to a new name, `(old, new)`.
    pub renamed_scripts: Vec<(String, String)>,
    /// History entries dropped for deleted scripts.
    pub removed_from_history: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
}

impl UpdateResult {
    /// Check if the update changed anything.
    pub fn has_changes(&self) -> bool {
        !self.executed_scripts.is_empty()
            || !self.renamed_scripts.is_empty()
            || !self.removed_from_history.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.executed_scripts.is_empty() {
            let verb = if self.dry_run { "to execute" } else { "executed" };
            parts.push(format!("{} {}", self.executed_scripts.len(), verb));
        }
        if !self.renamed_scripts.is_empty() {
            parts.push(format!("{} renamed", self.renamed_scripts.len()));
        }
        if !self.removed_from_history.is_empty() {
            parts.push(format!("{} removed from history", self.removed_from_history.len()));
        }

        if parts.is_empty() {
            "Database is up to date".to_string()
        } else if self.dry_run {
            format!("Dry run: {}", parts.join(", "))
        } else {
            format!("{} in {}ms", parts.join(", "), self.duration_ms)
        }
    }
}

/// Database state as seen by the engine.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Every history record, sorted by file name.
    pub executed: Vec<ExecutedScriptRecord>,
    /// Scripts an update would execute, pre/post-processing excluded.
    pub pending: Vec<String>,
    /// Scripts whose last execution failed.
    pub failed: Vec<String>,
    /// The full analysis.
    pub updates: ScriptUpdates,
}

impl MigrationStatus {
    /// Whether the database matches the scripts.
    pub fn is_up_to_date(&self) -> bool {
        self.updates.is_empty() && self.failed.is_empty()
    }
}

/// What an update will do, in order.
#[derive(Debug, Default)]
struct UpdatePlan {
    preprocessing: Vec<Script>,
    renames: Vec<(ExecutedScript, Script)>,
    removals: Vec<String>,
    scripts: Vec<Script>,
    postprocessing: Vec<Script>,
}

/// The main migration engine.
pub struct MigrationEngine<H: ExecutedScriptStore, E: SqlExecutor> {
    config: MigrationConfig,
    locations: Vec<Box<dyn ScriptLocation>>,
    history: H,
    executor: E,
    parsers: ScriptParserFactory,
}

impl<H: ExecutedScriptStore, E: SqlExecutor> MigrationEngine<H, E> {
    /// Create a new migration engine.
    pub fn new(
        config: MigrationConfig,
        locations: Vec<Box<dyn ScriptLocation>>,
        history: H,
        executor: E,
    ) -> Self {
        let parsers = ScriptParserFactory::new(&config.parser);
        Self {
            config,
            locations,
            history,
            executor,
            parsers,
        }
    }

    /// Create an engine scanning the directories listed in the configuration.
    pub fn from_config(config: MigrationConfig, history: H, executor: E) -> MigrateResult<Self> {
        if config.scripts.locations.is_empty() {
            return Err(MigrationError::config("no script locations configured"));
        }
        let locations = config
            .scripts
            .locations
            .iter()
            .map(|path| Box::new(FileSystemLocation::new(path)) as Box<dyn ScriptLocation>)
            .collect();
        Ok(Self::new(config, locations, history, executor))
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the history store.
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Get the executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Consume the engine, returning the executor.
    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Initialize the history store.
    pub async fn initialize(&self) -> MigrateResult<()> {
        self.history.initialize().await
    }

    /// Analyze the scripts against the history without changing anything.
    pub async fn check_script_updates(&self) -> MigrateResult<ScriptUpdates> {
        let (repository, executed) = self.load().await?;
        Ok(self.analyze(&repository, &executed))
    }

    /// Bring the database up to date.
    pub async fn update_database(&self) -> MigrateResult<UpdateResult> {
        let start = Instant::now();
        let dry_run = self.config.updates.dry_run;

        let _lock = if dry_run {
            None
        } else {
            Some(self.history.acquire_lock().await?)
        };

        let (repository, executed) = self.load().await?;
        let updates = self.analyze(&repository, &executed);

        if updates.has_irregular_updates() {
            return Err(MigrationError::IrregularScriptUpdates {
                report: updates.irregular_report(),
            });
        }

        if updates.has_ignored_scripts_and_script_changes() {
            for ignored in updates.ignored_scripts() {
                tracing::warn!(script = %ignored.script(), update = %ignored.update_type(), "ignoring script update");
            }
        }

        if let Some(failed) = executed.iter().find(|e| {
            !e.succeeded() && e.script().is_indexed_script() && !e.script().is_ignored()
        }) {
            return Err(MigrationError::PreviousScriptFailed(
                failed.script().file_name().to_string(),
            ));
        }

        let mut result = UpdateResult {
            dry_run,
            ..Default::default()
        };

        if !updates.has_regular_updates() {
            tracing::info!("database is up to date");
            return Ok(result);
        }

        let plan = self.plan(&repository, &executed, &updates);

        if dry_run {
            result.executed_scripts = plan.execution_order().map(|s| s.file_name().to_string()).collect();
            result.renamed_scripts = plan
                .renames
                .iter()
                .map(|(old, new)| (old.script().file_name().to_string(), new.file_name().to_string()))
                .collect();
            result.removed_from_history = plan.removals.clone();
            return Ok(result);
        }

        tracing::info!(summary = %updates.summary(), "updating database");

        for script in &plan.preprocessing {
            self.execute_script(script).await?;
            result.executed_scripts.push(script.file_name().to_string());
        }

        for (old, new) in &plan.renames {
            self.history.delete(old.script().file_name()).await?;
            self.history.upsert(old.renamed_to(new.clone()).to_record()).await?;
            tracing::debug!(from = %old.script(), to = %new, "renamed script in history");
            result
                .renamed_scripts
                .push((old.script().file_name().to_string(), new.file_name().to_string()));
        }

        for file_name in &plan.removals {
            self.history.delete(file_name).await?;
            tracing::debug!(script = %file_name, "removed script from history");
            result.removed_from_history.push(file_name.clone());
        }

        for script in plan.scripts.iter().chain(plan.postprocessing.iter()) {
            self.execute_script(script).await?;
            result.executed_scripts.push(script.file_name().to_string());
        }

        result.duration_ms = start.elapsed().as_millis() as i64;
        tracing::info!(summary = %result.summary(), "update finished");
        Ok(result)
    }

    /// Record every current script as executed without running anything.
    ///
    /// Returns the number of scripts recorded.
    pub async fn mark_database_as_up_to_date(&self) -> MigrateResult<usize> {
        let _lock = self.history.acquire_lock().await?;
        let repository = ScriptRepository::load(&self.config, &self.locations).await?;

        self.history.clear().await?;
        for script in repository.iter() {
            self.history.upsert(ExecutedScriptRecord::new(script, true)).await?;
        }

        tracing::info!(scripts = repository.len(), "marked database as up to date");
        Ok(repository.len())
    }

    /// Mark failed scripts as successfully executed.
    ///
    /// For when the operator finished the failed script by hand.
    pub async fn mark_error_script_performed(&self) -> MigrateResult<Vec<String>> {
        let _lock = self.history.acquire_lock().await?;
        let mut marked = Vec::new();
        for mut record in self.history.list().await? {
            if record.succeeded {
                continue;
            }
            record.succeeded = true;
            marked.push(record.file_name.clone());
            self.history.upsert(record).await?;
        }
        marked.sort();
        tracing::info!(scripts = ?marked, "marked failed scripts as performed");
        Ok(marked)
    }

    /// Forget failed scripts so the next update runs them again.
    ///
    /// For when the operator undid the effects of the failed script.
    pub async fn mark_error_script_reverted(&self) -> MigrateResult<Vec<String>> {
        let _lock = self.history.acquire_lock().await?;
        let mut reverted = Vec::new();
        for record in self.history.list().await? {
            if !record.succeeded {
                self.history.delete(&record.file_name).await?;
                reverted.push(record.file_name);
            }
        }
        reverted.sort();
        tracing::info!(scripts = ?reverted, "marked failed scripts as reverted");
        Ok(reverted)
    }

    /// Current state of the database.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let mut records = self.history.list().await?;
        records.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let (repository, executed) = self.load().await?;
        let updates = self.analyze(&repository, &executed);

        let pending = updates
            .regularly_added_patch_scripts()
            .iter()
            .chain(updates.regularly_added_or_modified().iter())
            .map(|u| u.script().clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|s| s.file_name().to_string())
            .collect();
        let failed = records
            .iter()
            .filter(|r| !r.succeeded)
            .map(|r| r.file_name.clone())
            .collect();

        Ok(MigrationStatus {
            executed: records,
            pending,
            failed,
            updates,
        })
    }

    async fn load(&self) -> MigrateResult<(ScriptRepository, Vec<ExecutedScript>)> {
        let repository = ScriptRepository::load(&self.config, &self.locations).await?;
        let factory = ScriptFactory::new(&self.config.scripts)?;

        let mut executed = self
            .history
            .list()
            .await?
            .iter()
            .map(|record| ExecutedScript::from_record(&factory, record))
            .collect::<MigrateResult<Vec<_>>>()?;
        executed.sort();

        tracing::debug!(
            scripts = repository.len(),
            executed = executed.len(),
            "loaded scripts and history"
        );
        Ok((repository, executed))
    }

    fn analyze(&self, repository: &ScriptRepository, executed: &[ExecutedScript]) -> ScriptUpdates {
        ScriptUpdatesAnalyzer::new(
            repository,
            executed,
            self.config.updates.allow_out_of_sequence_patches,
            self.config.updates.ignore_deletions,
        )
        .analyze()
    }

    fn plan(
        &self,
        repository: &ScriptRepository,
        executed: &[ExecutedScript],
        updates: &ScriptUpdates,
    ) -> UpdatePlan {
        let by_name: HashMap<&str, &ExecutedScript> = executed
            .iter()
            .map(|e| (e.script().file_name(), e))
            .collect();

        let renamed = updates
            .regularly_renamed_scripts()
            .iter()
            .chain(updates.regular_preprocessing_updates().iter())
            .chain(updates.regular_postprocessing_updates().iter())
            .filter(|u| u.update_type().is_rename());

        let mut renames = Vec::new();
        let mut removals = Vec::new();
        for update in renamed {
            let old = update.script().file_name();
            match (by_name.get(old), update.renamed_to()) {
                // processing scripts are recorded again when they run
                (Some(executed), Some(target))
                    if update.update_type() == ScriptUpdateType::RepeatableScriptRenamed
                        || update.update_type() == ScriptUpdateType::IndexedScriptRenamed =>
                {
                    renames.push(((*executed).clone(), target.clone()));
                }
                _ => removals.push(old.to_string()),
            }
        }

        removals.extend(
            updates
                .regularly_deleted_repeatable_scripts()
                .iter()
                .chain(updates.regular_preprocessing_updates().iter())
                .chain(updates.regular_postprocessing_updates().iter())
                .filter(|u| u.update_type().is_deletion())
                .map(|u| u.script().file_name().to_string()),
        );

        let scripts: BTreeSet<Script> = updates
            .regularly_added_patch_scripts()
            .iter()
            .chain(updates.regularly_added_or_modified().iter())
            .map(|u| u.script().clone())
            .collect();

        // history-only changes do not warrant a processing run
        let history_only = updates.no_updates_other_than_repeatable_deletions_or_renames();
        let processing = |bucket: &BTreeSet<Script>| -> Vec<Script> {
            if history_only {
                Vec::new()
            } else {
                bucket.iter().cloned().collect()
            }
        };

        UpdatePlan {
            preprocessing: processing(repository.preprocessing_scripts()),
            renames,
            removals,
            scripts: scripts.into_iter().collect(),
            postprocessing: processing(repository.postprocessing_scripts()),
        }
    }

    async fn execute_script(&self, script: &Script) -> MigrateResult<()> {
        // parse up front so a malformed script never runs half-way
        let statements = self.parsers.create_parser(script)?.statements()?;
        let target = script.target_database();

        tracing::debug!(script = %script, statements = statements.len(), "executing script");
        self.executor.start_script(script).await?;
        self.executor.begin(target).await?;

        for statement in &statements {
            tracing::debug!(script = %script, statement = %statement, "executing statement");
            if let Err(e) = self.executor.execute(target, statement).await {
                if let Err(rollback) = self.executor.rollback(target).await {
                    tracing::warn!(script = %script, error = %rollback, "rollback failed");
                }
                self.history.upsert(ExecutedScriptRecord::new(script, false)).await?;
                return Err(MigrationError::ScriptExecutionFailed {
                    script: script.file_name().to_string(),
                    statement: statement.clone(),
                    reason: e.to_string(),
                });
            }
        }

        self.executor.commit(target).await?;
        self.history.upsert(ExecutedScriptRecord::new(script, true)).await?;
        Ok(())
    }
}

impl UpdatePlan {
    fn execution_order(&self) -> impl Iterator<Item = &Script> {
        self.preprocessing
            .iter()
            .chain(self.scripts.iter())
            .chain(self.postprocessing.iter())
    }
}
