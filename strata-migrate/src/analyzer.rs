//! Comparison of the scripts at hand with the execution history.
//!
//! The analyzer classifies every difference between the repository and
//! the executed scripts into a [`ScriptUpdate`] and sorts it into the
//! bucket of [`ScriptUpdates`] that decides what the engine does with it:
//! regular updates are applied, irregular ones stop the update and ignored
//! ones are only reported.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use crate::history::ExecutedScript;
use crate::indexes::ScriptIndexes;
use crate::repository::ScriptRepository;
use crate::script::Script;

/// Kind of difference between a script and its execution history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptUpdateType {
    /// New indexed script sorting after every executed one.
    HigherIndexScriptAdded,
    /// New indexed script sorting before an executed one.
    LowerIndexNonPatchScriptAdded,
    /// New patch script sorting before an executed one.
    LowerIndexPatchScriptAdded,
    /// Executed indexed script whose content changed.
    IndexedScriptUpdated,
    /// Executed indexed script that no longer exists.
    IndexedScriptDeleted,
    /// Indexed script moved without changing the execution order.
    IndexedScriptRenamed,
    /// Indexed script moved past another executed script.
    IndexedScriptRenamedScriptSequenceChanged,
    /// New repeatable script.
    RepeatableScriptAdded,
    /// Repeatable script that changed or last failed.
    RepeatableScriptUpdated,
    /// Executed repeatable script that no longer exists.
    RepeatableScriptDeleted,
    /// Repeatable script moved to a new name.
    RepeatableScriptRenamed,
    /// New pre-processing script.
    PreprocessingScriptAdded,
    /// Pre-processing script whose content changed.
    PreprocessingScriptUpdated,
    /// Executed pre-processing script that no longer exists.
    PreprocessingScriptDeleted,
    /// Pre-processing script moved to a new name.
    PreprocessingScriptRenamed,
    /// New post-processing script.
    PostprocessingScriptAdded,
    /// Post-processing script whose content changed.
    PostprocessingScriptUpdated,
    /// Executed post-processing script that no longer exists.
    PostprocessingScriptDeleted,
    /// Post-processing script moved to a new name.
    PostprocessingScriptRenamed,
}

impl ScriptUpdateType {
    /// Human description used in reports.
    pub fn description(&self) -> &'static str {
        match self {
            Self::HigherIndexScriptAdded => "newly added script",
            Self::LowerIndexNonPatchScriptAdded => {
                "newly added script with a lower index than the highest executed script"
            }
            Self::LowerIndexPatchScriptAdded => "newly added patch script with a lower index",
            Self::IndexedScriptUpdated => "indexed script that was modified after it was executed",
            Self::IndexedScriptDeleted => "indexed script that was deleted after it was executed",
            Self::IndexedScriptRenamed => "renamed indexed script",
            Self::IndexedScriptRenamedScriptSequenceChanged => {
                "indexed script renamed in a way that changes the execution sequence"
            }
            Self::RepeatableScriptAdded => "newly added repeatable script",
            Self::RepeatableScriptUpdated => "modified repeatable script",
            Self::RepeatableScriptDeleted => "deleted repeatable script",
            Self::RepeatableScriptRenamed => "renamed repeatable script",
            Self::PreprocessingScriptAdded => "newly added pre-processing script",
            Self::PreprocessingScriptUpdated => "modified pre-processing script",
            Self::PreprocessingScriptDeleted => "deleted pre-processing script",
            Self::PreprocessingScriptRenamed => "renamed pre-processing script",
            Self::PostprocessingScriptAdded => "newly added post-processing script",
            Self::PostprocessingScriptUpdated => "modified post-processing script",
            Self::PostprocessingScriptDeleted => "deleted post-processing script",
            Self::PostprocessingScriptRenamed => "renamed post-processing script",
        }
    }

    /// Whether the script no longer exists.
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            Self::IndexedScriptDeleted
                | Self::RepeatableScriptDeleted
                | Self::PreprocessingScriptDeleted
                | Self::PostprocessingScriptDeleted
        )
    }

    /// Whether the script was renamed.
    pub fn is_rename(&self) -> bool {
        matches!(
            self,
            Self::IndexedScriptRenamed
                | Self::IndexedScriptRenamedScriptSequenceChanged
                | Self::RepeatableScriptRenamed
                | Self::PreprocessingScriptRenamed
                | Self::PostprocessingScriptRenamed
        )
    }
}

impl fmt::Display for ScriptUpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One classified difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUpdate {
    update_type: ScriptUpdateType,
    script: Script,
    renamed_to: Option<Script>,
}

impl ScriptUpdate {
    /// Update of a single script.
    pub fn new(update_type: ScriptUpdateType, script: Script) -> Self {
        Self {
            update_type,
            script,
            renamed_to: None,
        }
    }

    /// Rename of `script` to `renamed_to`.
    pub fn renamed(update_type: ScriptUpdateType, script: Script, renamed_to: Script) -> Self {
        Self {
            update_type,
            script,
            renamed_to: Some(renamed_to),
        }
    }

    /// Kind of update.
    pub fn update_type(&self) -> ScriptUpdateType {
        self.update_type
    }

    /// The script concerned. For renames and deletions, the executed one.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// New identity for renames.
    pub fn renamed_to(&self) -> Option<&Script> {
        self.renamed_to.as_ref()
    }
}

impl Ord for ScriptUpdate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.script
            .cmp(&other.script)
            .then_with(|| self.update_type.cmp(&other.update_type))
            .then_with(|| self.renamed_to.cmp(&other.renamed_to))
    }
}

impl PartialOrd for ScriptUpdate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScriptUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.renamed_to {
            Some(target) => write!(f, "{}: {} -> {}", self.update_type, self.script, target),
            None => write!(f, "{}: {}", self.update_type, self.script),
        }
    }
}

/// The result of an analysis, bucketed by how each update is handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptUpdates {
    regularly_added_or_modified: BTreeSet<ScriptUpdate>,
    regularly_added_patch_scripts: BTreeSet<ScriptUpdate>,
    regularly_deleted_repeatable_scripts: BTreeSet<ScriptUpdate>,
    regularly_renamed_scripts: BTreeSet<ScriptUpdate>,
    regular_preprocessing_updates: BTreeSet<ScriptUpdate>,
    regular_postprocessing_updates: BTreeSet<ScriptUpdate>,
    irregular_updates: BTreeSet<ScriptUpdate>,
    ignored_scripts: BTreeSet<ScriptUpdate>,
}

impl ScriptUpdates {
    /// Higher-index additions and repeatable additions or modifications.
    pub fn regularly_added_or_modified(&self) -> &BTreeSet<ScriptUpdate> {
        &self.regularly_added_or_modified
    }

    /// Lower-index patch scripts, when out-of-sequence patches are allowed.
    pub fn regularly_added_patch_scripts(&self) -> &BTreeSet<ScriptUpdate> {
        &self.regularly_added_patch_scripts
    }

    /// Deleted repeatable scripts.
    pub fn regularly_deleted_repeatable_scripts(&self) -> &BTreeSet<ScriptUpdate> {
        &self.regularly_deleted_repeatable_scripts
    }

    /// Indexed and repeatable renames.
    pub fn regularly_renamed_scripts(&self) -> &BTreeSet<ScriptUpdate> {
        &self.regularly_renamed_scripts
    }

    /// Added, modified, renamed and deleted pre-processing scripts.
    pub fn regular_preprocessing_updates(&self) -> &BTreeSet<ScriptUpdate> {
        &self.regular_preprocessing_updates
    }

    /// Added, modified, renamed and deleted post-processing scripts.
    pub fn regular_postprocessing_updates(&self) -> &BTreeSet<ScriptUpdate> {
        &self.regular_postprocessing_updates
    }

    /// Updates that must not be applied automatically.
    pub fn irregular_updates(&self) -> &BTreeSet<ScriptUpdate> {
        &self.irregular_updates
    }

    /// Updates reported but neither applied nor blocking.
    pub fn ignored_scripts(&self) -> &BTreeSet<ScriptUpdate> {
        &self.ignored_scripts
    }

    /// Whether anything blocks the update.
    pub fn has_irregular_updates(&self) -> bool {
        !self.irregular_updates.is_empty()
    }

    /// Whether any update was ignored.
    pub fn has_ignored_scripts(&self) -> bool {
        !self.ignored_scripts.is_empty()
    }

    /// Ignored scripts next to changes that will be applied or rejected.
    pub fn has_ignored_scripts_and_script_changes(&self) -> bool {
        self.has_ignored_scripts() && (self.has_regular_updates() || self.has_irregular_updates())
    }

    /// Whether any regular bucket is non-empty.
    pub fn has_regular_updates(&self) -> bool {
        self.regular_buckets().any(|b| !b.is_empty())
    }

    /// Whether nothing at all changed.
    pub fn is_empty(&self) -> bool {
        !self.has_regular_updates() && !self.has_irregular_updates() && !self.has_ignored_scripts()
    }

    /// Whether the only changes are repeatable deletions and renames, which
    /// touch the history but run no script.
    pub fn no_updates_other_than_repeatable_deletions_or_renames(&self) -> bool {
        self.regularly_added_or_modified.is_empty()
            && self.regularly_added_patch_scripts.is_empty()
            && self.regular_preprocessing_updates.is_empty()
            && self.regular_postprocessing_updates.is_empty()
            && self.irregular_updates.is_empty()
    }

    /// Every regular update, bucket by bucket.
    pub fn regular_updates(&self) -> impl Iterator<Item = &ScriptUpdate> {
        self.regular_buckets().flat_map(|b| b.iter())
    }

    /// One line per irregular update.
    pub fn irregular_report(&self) -> String {
        self.irregular_updates
            .iter()
            .map(|u| format!("  - {}", u))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get a human-readable summary of the updates.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        let counts = [
            (self.regularly_added_or_modified.len(), "added or modified"),
            (self.regularly_added_patch_scripts.len(), "patches"),
            (self.regularly_renamed_scripts.len(), "renamed"),
            (self.regularly_deleted_repeatable_scripts.len(), "deleted repeatable"),
            (self.regular_preprocessing_updates.len(), "pre-processing updates"),
            (self.regular_postprocessing_updates.len(), "post-processing updates"),
            (self.irregular_updates.len(), "irregular"),
            (self.ignored_scripts.len(), "ignored"),
        ];
        for (count, label) in counts {
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }

    fn regular_buckets(&self) -> impl Iterator<Item = &BTreeSet<ScriptUpdate>> {
        [
            &self.regularly_added_or_modified,
            &self.regularly_added_patch_scripts,
            &self.regularly_deleted_repeatable_scripts,
            &self.regularly_renamed_scripts,
            &self.regular_preprocessing_updates,
            &self.regular_postprocessing_updates,
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Indexed,
    Repeatable,
    Preprocessing,
    Postprocessing,
}

impl Namespace {
    fn of(script: &Script) -> Self {
        if script.is_preprocessing() {
            Self::Preprocessing
        } else if script.is_postprocessing() {
            Self::Postprocessing
        } else if script.is_incremental_script() {
            Self::Indexed
        } else {
            Self::Repeatable
        }
    }
}

/// Scripts of one namespace, paired up by name and by content.
struct Matching<'a> {
    /// Same name on both sides.
    matched: Vec<(&'a ExecutedScript, &'a Script)>,
    /// Current scripts that are neither matched nor a rename target.
    added: Vec<&'a Script>,
    /// Executed script and the current script it was renamed to.
    renamed: Vec<(&'a ExecutedScript, &'a Script)>,
    /// Executed scripts without any counterpart.
    deleted: Vec<&'a ExecutedScript>,
}

impl<'a> Matching<'a> {
    fn new(current: &'a BTreeSet<Script>, executed: &[&'a ExecutedScript]) -> Self {
        let executed_names: HashSet<&str> = executed.iter().map(|e| e.script().file_name()).collect();
        let current_by_name: HashMap<&str, &'a Script> =
            current.iter().map(|s| (s.file_name(), s)).collect();

        let mut matched = Vec::new();
        let mut unmatched_executed = Vec::new();
        for &executed_script in executed {
            match current_by_name.get(executed_script.script().file_name()) {
                Some(script) => matched.push((executed_script, *script)),
                None => unmatched_executed.push(executed_script),
            }
        }

        // candidates keyed on content, kept in script order
        let mut by_content: HashMap<(String, i64), VecDeque<&'a Script>> = HashMap::new();
        for script in current.iter().filter(|s| !executed_names.contains(s.file_name())) {
            by_content.entry(script.content_key()).or_default().push_back(script);
        }

        let mut renamed = Vec::new();
        let mut deleted = Vec::new();
        let mut targets: HashSet<&str> = HashSet::new();
        for executed_script in unmatched_executed {
            let target = by_content
                .get_mut(&executed_script.script().content_key())
                .and_then(VecDeque::pop_front);
            match target {
                Some(script) => {
                    targets.insert(script.file_name());
                    renamed.push((executed_script, script));
                }
                None => deleted.push(executed_script),
            }
        }

        let added = current
            .iter()
            .filter(|s| !executed_names.contains(s.file_name()) && !targets.contains(s.file_name()))
            .collect();

        Self {
            matched,
            added,
            renamed,
            deleted,
        }
    }
}

/// Computes the [`ScriptUpdates`] between a repository and the history.
pub struct ScriptUpdatesAnalyzer<'a> {
    repository: &'a ScriptRepository,
    executed: &'a [ExecutedScript],
    allow_out_of_sequence_patches: bool,
    ignore_deletions: bool,
}

impl<'a> ScriptUpdatesAnalyzer<'a> {
    /// Create an analyzer.
    pub fn new(
        repository: &'a ScriptRepository,
        executed: &'a [ExecutedScript],
        allow_out_of_sequence_patches: bool,
        ignore_deletions: bool,
    ) -> Self {
        Self {
            repository,
            executed,
            allow_out_of_sequence_patches,
            ignore_deletions,
        }
    }

    /// Classify every difference.
    pub fn analyze(&self) -> ScriptUpdates {
        let mut updates = ScriptUpdates::default();

        self.analyze_indexed(&mut updates);
        self.analyze_repeatable(&mut updates);
        self.analyze_processing(
            &mut updates,
            Namespace::Preprocessing,
            self.repository.preprocessing_scripts(),
        );
        self.analyze_processing(
            &mut updates,
            Namespace::Postprocessing,
            self.repository.postprocessing_scripts(),
        );

        tracing::debug!(summary = %updates.summary(), "analyzed script updates");
        updates
    }

    fn executed_in(&self, namespace: Namespace) -> Vec<&'a ExecutedScript> {
        let mut executed: Vec<&ExecutedScript> = self
            .executed
            .iter()
            .filter(|e| !e.script().is_ignored() && Namespace::of(e.script()) == namespace)
            .collect();
        executed.sort();
        executed
    }

    fn analyze_indexed(&self, updates: &mut ScriptUpdates) {
        use ScriptUpdateType::*;

        let executed = self.executed_in(Namespace::Indexed);
        let matching = Matching::new(self.repository.indexed_scripts(), &executed);

        // where every executed script ends up after the renames
        let effective: HashMap<&str, &ScriptIndexes> = matching
            .renamed
            .iter()
            .map(|(old, new)| (old.script().file_name(), new.indexes()))
            .collect();

        // a renamed script counts at both its old and its new position
        let high_water_mark: Option<&ScriptIndexes> = executed
            .iter()
            .flat_map(|e| {
                let indexes = e.script().indexes();
                [Some(indexes), effective.get(e.script().file_name()).copied()]
            })
            .flatten()
            .max();

        for (executed_script, script) in &matching.matched {
            if !executed_script.script().has_same_content(script) {
                updates
                    .irregular_updates
                    .insert(ScriptUpdate::new(IndexedScriptUpdated, (*script).clone()));
            }
        }

        for script in &matching.added {
            let is_higher = high_water_mark.is_none_or(|mark| script.indexes() > mark);
            let update = if is_higher {
                &mut updates.regularly_added_or_modified
            } else if script.is_patch() && self.allow_out_of_sequence_patches {
                &mut updates.regularly_added_patch_scripts
            } else {
                &mut updates.irregular_updates
            };
            let update_type = if is_higher {
                HigherIndexScriptAdded
            } else if script.is_patch() {
                LowerIndexPatchScriptAdded
            } else {
                LowerIndexNonPatchScriptAdded
            };
            update.insert(ScriptUpdate::new(update_type, (*script).clone()));
        }

        for (old, new) in &matching.renamed {
            let keeps_sequence = executed
                .iter()
                .filter(|other| other.script() != old.script())
                .all(|other| {
                    let other_indexes = other.script().indexes();
                    let other_effective = effective
                        .get(other.script().file_name())
                        .copied()
                        .unwrap_or(other_indexes);
                    old.script().indexes().cmp(other_indexes) == new.indexes().cmp(other_effective)
                });

            let update_type = if keeps_sequence {
                IndexedScriptRenamed
            } else {
                IndexedScriptRenamedScriptSequenceChanged
            };
            let update = ScriptUpdate::renamed(update_type, old.script().clone(), (*new).clone());
            if keeps_sequence {
                updates.regularly_renamed_scripts.insert(update);
            } else {
                updates.irregular_updates.insert(update);
            }
        }

        for executed_script in &matching.deleted {
            let update = ScriptUpdate::new(IndexedScriptDeleted, executed_script.script().clone());
            if self.ignore_deletions {
                updates.ignored_scripts.insert(update);
            } else {
                updates.irregular_updates.insert(update);
            }
        }
    }

    fn analyze_repeatable(&self, updates: &mut ScriptUpdates) {
        use ScriptUpdateType::*;

        let executed = self.executed_in(Namespace::Repeatable);
        let matching = Matching::new(self.repository.repeatable_scripts(), &executed);

        for (executed_script, script) in &matching.matched {
            if !executed_script.script().has_same_content(script) || !executed_script.succeeded() {
                updates
                    .regularly_added_or_modified
                    .insert(ScriptUpdate::new(RepeatableScriptUpdated, (*script).clone()));
            }
        }

        for script in &matching.added {
            updates
                .regularly_added_or_modified
                .insert(ScriptUpdate::new(RepeatableScriptAdded, (*script).clone()));
        }

        for (old, new) in &matching.renamed {
            updates.regularly_renamed_scripts.insert(ScriptUpdate::renamed(
                RepeatableScriptRenamed,
                old.script().clone(),
                (*new).clone(),
            ));
        }

        for executed_script in &matching.deleted {
            let update = ScriptUpdate::new(RepeatableScriptDeleted, executed_script.script().clone());
            if self.ignore_deletions {
                updates.ignored_scripts.insert(update);
            } else {
                updates.regularly_deleted_repeatable_scripts.insert(update);
            }
        }
    }

    fn analyze_processing(
        &self,
        updates: &mut ScriptUpdates,
        namespace: Namespace,
        current: &'a BTreeSet<Script>,
    ) {
        use ScriptUpdateType::*;

        let (added, updated, deleted, renamed) = match namespace {
            Namespace::Preprocessing => (
                PreprocessingScriptAdded,
                PreprocessingScriptUpdated,
                PreprocessingScriptDeleted,
                PreprocessingScriptRenamed,
            ),
            _ => (
                PostprocessingScriptAdded,
                PostprocessingScriptUpdated,
                PostprocessingScriptDeleted,
                PostprocessingScriptRenamed,
            ),
        };

        let executed = self.executed_in(namespace);
        let matching = Matching::new(current, &executed);
        let mut bucket = BTreeSet::new();

        for (executed_script, script) in &matching.matched {
            if !executed_script.script().has_same_content(script) {
                bucket.insert(ScriptUpdate::new(updated, (*script).clone()));
            }
        }
        for script in &matching.added {
            bucket.insert(ScriptUpdate::new(added, (*script).clone()));
        }
        for (old, new) in &matching.renamed {
            bucket.insert(ScriptUpdate::renamed(renamed, old.script().clone(), (*new).clone()));
        }
        for executed_script in &matching.deleted {
            let update = ScriptUpdate::new(deleted, executed_script.script().clone());
            if self.ignore_deletions {
                updates.ignored_scripts.insert(update);
            } else {
                bucket.insert(update);
            }
        }

        match namespace {
            Namespace::Preprocessing => updates.regular_preprocessing_updates.extend(bucket),
            _ => updates.regular_postprocessing_updates.extend(bucket),
        }
    }
}
