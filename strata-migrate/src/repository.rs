//! The script repository: every script of every location, sorted into the
//! buckets the analyzer and the engine work with.

use std::collections::{BTreeSet, HashMap};

use crate::config::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::location::{ScriptLocation, ScriptSource};
use crate::script::{Script, ScriptFactory};

/// Qualifier-based inclusion and exclusion.
#[derive(Debug, Clone, Default)]
pub struct QualifierFilter {
    included: BTreeSet<String>,
    excluded: BTreeSet<String>,
}

impl QualifierFilter {
    /// Build a filter, checking both lists against the registered qualifiers.
    pub fn new<I, E>(registered: &BTreeSet<String>, included: I, excluded: E) -> MigrateResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let included = checked(registered, "included_qualifiers", included)?;
        let excluded = checked(registered, "excluded_qualifiers", excluded)?;
        Ok(Self { included, excluded })
    }

    /// Whether a script passes the filter.
    pub fn accepts(&self, script: &Script) -> bool {
        if script.qualifiers().iter().any(|q| self.excluded.contains(q)) {
            return false;
        }
        self.included.is_empty() || script.qualifiers().iter().any(|q| self.included.contains(q))
    }
}

fn checked<I>(registered: &BTreeSet<String>, key: &str, items: I) -> MigrateResult<BTreeSet<String>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|q| q.as_ref().to_lowercase())
        .map(|qualifier| {
            if registered.contains(&qualifier) {
                Ok(qualifier)
            } else {
                Err(MigrationError::UnregisteredQualifier {
                    script: key.to_string(),
                    qualifier,
                })
            }
        })
        .collect()
}

/// All scripts of one invocation, bucketed and sorted.
#[derive(Debug, Clone, Default)]
pub struct ScriptRepository {
    preprocessing: BTreeSet<Script>,
    indexed: BTreeSet<Script>,
    repeatable: BTreeSet<Script>,
    postprocessing: BTreeSet<Script>,
    ignored: BTreeSet<Script>,
}

impl ScriptRepository {
    /// Scan every location and build the repository.
    pub async fn load(
        config: &MigrationConfig,
        locations: &[Box<dyn ScriptLocation>],
    ) -> MigrateResult<Self> {
        config.validate()?;
        let factory = ScriptFactory::new(&config.scripts)?;
        let filter = QualifierFilter::new(
            factory.registered_qualifiers(),
            &config.scripts.included_qualifiers,
            &config.scripts.excluded_qualifiers,
        )?;

        let mut sources = Vec::new();
        for location in locations {
            let found = location.scripts(&config.scripts.extensions).await?;
            tracing::debug!(location = location.name(), scripts = found.len(), "scanned location");
            sources.extend(found.into_iter().map(|s| (location.name().to_string(), s)));
        }

        Self::build(&factory, &filter, &config.databases, sources)
    }

    /// Build the repository from already scanned sources.
    pub fn build(
        factory: &ScriptFactory,
        filter: &QualifierFilter,
        databases: &[String],
        sources: impl IntoIterator<Item = (String, ScriptSource)>,
    ) -> MigrateResult<Self> {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut repository = Self::default();

        for (location, source) in sources {
            let script = factory.create(
                &source.relative_path,
                source.last_modified_at,
                source.content,
            )?;

            if let Some(first_location) = seen.get(script.file_name()) {
                return Err(MigrationError::DuplicateScript {
                    file_name: script.file_name().to_string(),
                    first_location: first_location.clone(),
                    second_location: location,
                });
            }
            seen.insert(script.file_name().to_string(), location);

            if !filter.accepts(&script) {
                tracing::debug!(script = %script, "excluded by qualifier filter");
                continue;
            }

            if let Some(database) = script.target_database() {
                if !databases.is_empty() && !databases.iter().any(|d| d == database) {
                    return Err(MigrationError::UnknownTargetDatabase {
                        script: script.file_name().to_string(),
                        database: database.to_string(),
                    });
                }
            }

            repository.insert(script);
        }

        repository.check_duplicate_indexes()?;
        Ok(repository)
    }

    fn insert(&mut self, script: Script) {
        let bucket = if script.is_preprocessing() {
            &mut self.preprocessing
        } else if script.is_postprocessing() {
            &mut self.postprocessing
        } else if script.is_ignored() {
            &mut self.ignored
        } else if script.is_incremental_script() {
            &mut self.indexed
        } else {
            &mut self.repeatable
        };
        bucket.insert(script);
    }

    fn check_duplicate_indexes(&self) -> MigrateResult<()> {
        let mut incremental: Vec<&Script> = self.indexed.iter().chain(self.ignored.iter()).collect();
        incremental.sort();

        for pair in incremental.windows(2) {
            if pair[0].indexes() == pair[1].indexes() {
                return Err(MigrationError::DuplicateIndex {
                    first: pair[0].file_name().to_string(),
                    second: pair[1].file_name().to_string(),
                    indexes: pair[0].indexes().to_canonical_string(),
                });
            }
        }
        Ok(())
    }

    /// Indexed scripts, baseline-ignored ones excluded.
    pub fn indexed_scripts(&self) -> &BTreeSet<Script> {
        &self.indexed
    }

    /// Repeatable scripts.
    pub fn repeatable_scripts(&self) -> &BTreeSet<Script> {
        &self.repeatable
    }

    /// Pre-processing scripts.
    pub fn preprocessing_scripts(&self) -> &BTreeSet<Script> {
        &self.preprocessing
    }

    /// Post-processing scripts.
    pub fn postprocessing_scripts(&self) -> &BTreeSet<Script> {
        &self.postprocessing
    }

    /// Indexed scripts sorting below the baseline.
    pub fn ignored_scripts(&self) -> &BTreeSet<Script> {
        &self.ignored
    }

    /// Indexed and repeatable scripts, in execution order.
    pub fn all_update_scripts(&self) -> BTreeSet<Script> {
        self.indexed.union(&self.repeatable).cloned().collect()
    }

    /// Every script that takes part in updates, in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = &Script> {
        self.preprocessing
            .iter()
            .chain(self.indexed.iter())
            .chain(self.repeatable.iter())
            .chain(self.postprocessing.iter())
    }

    /// Find a non-ignored script by file name.
    pub fn get(&self, file_name: &str) -> Option<&Script> {
        self.iter().find(|s| s.file_name() == file_name)
    }

    /// Whether a non-ignored script with this file name exists.
    pub fn contains(&self, file_name: &str) -> bool {
        self.get(file_name).is_some()
    }

    /// Number of scripts taking part in updates.
    pub fn len(&self) -> usize {
        self.preprocessing.len() + self.indexed.len() + self.repeatable.len() + self.postprocessing.len()
    }

    /// Whether there are no scripts taking part in updates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
