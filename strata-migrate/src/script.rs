//! Script identity.
//!
//! A [`Script`] is identified by its file name, the path relative to the
//! location it was found in. Everything else about it (indexes, qualifiers,
//! pre/post-processing role, target database) is derived from that path by
//! a [`ScriptFactory`] so that scripts found on disk and scripts rebuilt from
//! the execution history agree on their identity.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};

use crate::config::ScriptConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::indexes::ScriptIndexes;

/// Compute the checksum of script content.
pub fn compute_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// One SQL script.
#[derive(Clone)]
pub struct Script {
    file_name: String,
    last_modified_at: i64,
    content: Option<Arc<str>>,
    checksum: OnceLock<String>,
    indexes: ScriptIndexes,
    qualifiers: BTreeSet<String>,
    is_patch: bool,
    is_preprocessing: bool,
    is_postprocessing: bool,
    is_ignored: bool,
    target_database: Option<String>,
}

impl Script {
    /// Relative path of the script, `/`-separated.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Last modification time in epoch milliseconds.
    pub fn last_modified_at(&self) -> i64 {
        self.last_modified_at
    }

    /// Script content, when the script was read from a location.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Checksum of the content, computed on first use.
    pub fn checksum(&self) -> &str {
        self.checksum
            .get_or_init(|| compute_checksum(self.content.as_deref().unwrap_or_default()))
    }

    /// Whether both scripts have the same content checksum.
    pub fn has_same_content(&self, other: &Script) -> bool {
        self.checksum() == other.checksum()
    }

    /// Indexes derived from the path.
    pub fn indexes(&self) -> &ScriptIndexes {
        &self.indexes
    }

    /// Qualifiers, lower-cased.
    pub fn qualifiers(&self) -> &BTreeSet<String> {
        &self.qualifiers
    }

    /// Whether the script carries the given qualifier.
    pub fn has_qualifier(&self, qualifier: &str) -> bool {
        self.qualifiers.contains(&qualifier.to_lowercase())
    }

    /// Whether the script may run out of index order.
    pub fn is_patch(&self) -> bool {
        self.is_patch
    }

    /// Whether the script lives under the pre-processing directory.
    pub fn is_preprocessing(&self) -> bool {
        self.is_preprocessing
    }

    /// Whether the script lives under the post-processing directory.
    pub fn is_postprocessing(&self) -> bool {
        self.is_postprocessing
    }

    /// Whether the script sorts below the configured baseline.
    pub fn is_ignored(&self) -> bool {
        self.is_ignored
    }

    /// Logical database the script must run against.
    pub fn target_database(&self) -> Option<&str> {
        self.target_database.as_deref()
    }

    /// One-time, order-sensitive script.
    pub fn is_incremental_script(&self) -> bool {
        self.indexes.is_incremental()
    }

    /// Script without enforced order, re-run when its content changes.
    pub fn is_repeatable_script(&self) -> bool {
        !self.is_incremental_script()
    }

    /// Incremental script outside the pre/post-processing directories.
    pub fn is_indexed_script(&self) -> bool {
        self.is_incremental_script() && !self.is_preprocessing && !self.is_postprocessing
    }

    /// Key joining scripts that have the same content and timestamp.
    pub fn content_key(&self) -> (String, i64) {
        (self.checksum().to_string(), self.last_modified_at)
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        self.file_name == other.file_name
    }
}

impl Eq for Script {}

impl Hash for Script {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file_name.hash(state);
    }
}

impl Ord for Script {
    fn cmp(&self, other: &Self) -> Ordering {
        self.indexes
            .cmp(&other.indexes)
            .then_with(|| self.file_name.cmp(&other.file_name))
    }
}

impl PartialOrd for Script {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("file_name", &self.file_name)
            .field("indexes", &self.indexes.to_canonical_string())
            .field("last_modified_at", &self.last_modified_at)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Builds scripts from their paths.
#[derive(Debug, Clone)]
pub struct ScriptFactory {
    separator: char,
    qualifier_prefix: char,
    target_database_prefix: char,
    registered_qualifiers: BTreeSet<String>,
    patch_qualifiers: BTreeSet<String>,
    preprocessing_dir: String,
    postprocessing_dir: String,
    baseline: Option<ScriptIndexes>,
}

impl ScriptFactory {
    /// Create a factory from the script configuration.
    pub fn new(config: &ScriptConfig) -> MigrateResult<Self> {
        Ok(Self {
            separator: config.index_separator,
            qualifier_prefix: config.qualifier_prefix,
            target_database_prefix: config.target_database_prefix,
            registered_qualifiers: config.registered_qualifiers(),
            patch_qualifiers: config
                .patch_qualifiers
                .iter()
                .map(|q| q.to_lowercase())
                .collect(),
            preprocessing_dir: config.preprocessing_dir.clone(),
            postprocessing_dir: config.postprocessing_dir.clone(),
            baseline: config.baseline()?,
        })
    }

    /// Registered qualifier names.
    pub fn registered_qualifiers(&self) -> &BTreeSet<String> {
        &self.registered_qualifiers
    }

    /// The configured baseline, if any.
    pub fn baseline(&self) -> Option<&ScriptIndexes> {
        self.baseline.as_ref()
    }

    /// Create a script from content read at a location.
    pub fn create(
        &self,
        file_name: &str,
        last_modified_at: i64,
        content: impl Into<Arc<str>>,
    ) -> MigrateResult<Script> {
        self.build(file_name, last_modified_at, Some(content.into()), OnceLock::new())
    }

    /// Create a script whose checksum is already known (rebuilt from history).
    pub fn create_with_checksum(
        &self,
        file_name: &str,
        last_modified_at: i64,
        checksum: impl Into<String>,
    ) -> MigrateResult<Script> {
        let known = OnceLock::new();
        let _ = known.set(checksum.into());
        self.build(file_name, last_modified_at, None, known)
    }

    /// New identity for `script` under another name, keeping checksum and timestamp.
    pub fn renamed(&self, script: &Script, new_file_name: &str) -> MigrateResult<Script> {
        let known = OnceLock::new();
        let _ = known.set(script.checksum().to_string());
        self.build(
            new_file_name,
            script.last_modified_at,
            script.content.clone(),
            known,
        )
    }

    fn build(
        &self,
        file_name: &str,
        last_modified_at: i64,
        content: Option<Arc<str>>,
        checksum: OnceLock<String>,
    ) -> MigrateResult<Script> {
        let file_name = normalize_path(file_name);
        let segments: Vec<&str> = file_name.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file_segment, dir_segments)) = segments.split_last() else {
            return Err(MigrationError::config("script file name is empty"));
        };

        let mut indexes = Vec::with_capacity(segments.len());
        let mut qualifiers = BTreeSet::new();
        let mut target_database = None;

        for (position, segment) in segments.iter().enumerate() {
            let is_file = position + 1 == segments.len();
            let name = if is_file {
                strip_extension(segment)
            } else {
                *segment
            };
            let parsed = self.parse_segment(&file_name, name)?;
            indexes.push(parsed.index);
            qualifiers.extend(parsed.qualifiers);
            if parsed.target_database.is_some() {
                target_database = parsed.target_database;
            }
        }

        let indexes = ScriptIndexes::new(indexes);
        if indexes.is_repeatable() && indexes.has_any_index() {
            return Err(MigrationError::RepeatableScriptInIndexedFolder(file_name));
        }

        let is_preprocessing = dir_segments.iter().any(|d| *d == self.preprocessing_dir);
        let is_postprocessing = dir_segments.iter().any(|d| *d == self.postprocessing_dir);
        if is_preprocessing && is_postprocessing {
            return Err(MigrationError::config(format!(
                "script '{}' is both a pre-processing and a post-processing script",
                file_name
            )));
        }
        tracing::trace!(script = %file_name, file = %file_segment, "derived script identity");

        let is_patch = qualifiers.iter().any(|q| self.patch_qualifiers.contains(q));
        let is_ignored = indexes.is_incremental()
            && !is_preprocessing
            && !is_postprocessing
            && self.baseline.as_ref().is_some_and(|b| indexes < *b);

        Ok(Script {
            file_name,
            last_modified_at,
            content,
            checksum,
            indexes,
            qualifiers,
            is_patch,
            is_preprocessing,
            is_postprocessing,
            is_ignored,
            target_database,
        })
    }

    fn parse_segment(&self, file_name: &str, name: &str) -> MigrateResult<ParsedSegment> {
        let mut parsed = ParsedSegment::default();

        for (position, token) in name.split(self.separator).enumerate() {
            if position == 0 && !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
                let index = token
                    .parse::<u64>()
                    .map_err(|e| MigrationError::invalid_indexes(token, e.to_string()))?;
                parsed.index = Some(index);
            } else if let Some(qualifier) = token.strip_prefix(self.qualifier_prefix) {
                let qualifier = qualifier.to_lowercase();
                if !self.registered_qualifiers.contains(&qualifier) {
                    return Err(MigrationError::UnregisteredQualifier {
                        script: file_name.to_string(),
                        qualifier,
                    });
                }
                parsed.qualifiers.push(qualifier);
            } else if let Some(database) = token.strip_prefix(self.target_database_prefix) {
                if !database.is_empty() {
                    parsed.target_database = Some(database.to_string());
                }
            }
        }

        Ok(parsed)
    }
}

#[derive(Debug, Default)]
struct ParsedSegment {
    index: Option<u64>,
    qualifiers: Vec<String>,
    target_database: Option<String>,
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;

    fn factory(config: MigrationConfig) -> ScriptFactory {
        ScriptFactory::new(&config.scripts).unwrap()
    }

    fn default_factory() -> ScriptFactory {
        factory(MigrationConfig::default())
    }

    #[test]
    fn test_indexes_from_path() {
        let script = default_factory()
            .create("01_schema/02_create_users.sql", 0, "")
            .unwrap();
        assert_eq!(script.indexes().to_canonical_string(), "1.2");
        assert!(script.is_incremental_script());
        assert!(script.is_indexed_script());
    }

    #[test]
    fn test_file_without_separator_is_indexed() {
        let script = default_factory().create("01_schema/003.sql", 0, "").unwrap();
        assert_eq!(script.indexes().to_canonical_string(), "1.3");
    }

    #[test]
    fn test_non_numeric_prefix_is_absent() {
        let script = default_factory()
            .create("repeatable/v1_views.sql", 0, "")
            .unwrap();
        assert_eq!(script.indexes().to_canonical_string(), "x.x");
        assert!(script.is_repeatable_script());
    }

    #[test]
    fn test_repeatable_in_indexed_folder_rejected() {
        let err = default_factory()
            .create("01_schema/views.sql", 0, "")
            .unwrap_err();
        assert!(matches!(err, MigrationError::RepeatableScriptInIndexedFolder(_)));
    }

    #[test]
    fn test_incremental_under_unindexed_folder() {
        let script = default_factory()
            .create("schema/02_users.sql", 0, "")
            .unwrap();
        assert_eq!(script.indexes().to_canonical_string(), "x.2");
        assert!(script.is_incremental_script());
    }

    #[test]
    fn test_qualifiers_and_patch() {
        let factory = factory(MigrationConfig::new().qualifiers(["hotfix"]));
        let script = factory
            .create("01_#patch_#HotFix_add_column.sql", 0, "")
            .unwrap();
        assert!(script.is_patch());
        assert!(script.has_qualifier("hotfix"));
        assert!(script.has_qualifier("PATCH"));
        assert_eq!(script.indexes().to_canonical_string(), "1");
    }

    #[test]
    fn test_qualifier_on_folder() {
        let script = default_factory()
            .create("02_#patch/01_fix.sql", 0, "")
            .unwrap();
        assert!(script.is_patch());
        assert_eq!(script.indexes().to_canonical_string(), "2.1");
    }

    #[test]
    fn test_unregistered_qualifier_rejected() {
        let err = default_factory()
            .create("01_#unknown_script.sql", 0, "")
            .unwrap_err();
        match err {
            MigrationError::UnregisteredQualifier { qualifier, .. } => {
                assert_eq!(qualifier, "unknown")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_target_database() {
        let script = default_factory()
            .create("@main/01_@audit_create_log.sql", 0, "")
            .unwrap();
        assert_eq!(script.target_database(), Some("audit"));
        assert_eq!(script.indexes().to_canonical_string(), "x.1");

        let script = default_factory().create("01_create.sql", 0, "").unwrap();
        assert_eq!(script.target_database(), None);
    }

    #[test]
    fn test_pre_and_post_processing() {
        let factory = default_factory();
        let pre = factory.create("preprocessing/01_drop_views.sql", 0, "").unwrap();
        assert!(pre.is_preprocessing());
        assert!(!pre.is_indexed_script());

        let post = factory
            .create("app/postprocessing/grants.sql", 0, "")
            .unwrap();
        assert!(post.is_postprocessing());

        let not_post = factory.create("postprocessing.sql", 0, "").unwrap();
        assert!(!not_post.is_postprocessing());
    }

    #[test]
    fn test_baseline_marks_ignored() {
        let factory = factory(MigrationConfig::new().baseline_revision("1.2"));
        let old = factory.create("01_v1/01_init.sql", 0, "").unwrap();
        let at = factory.create("01_v1/02_more.sql", 0, "").unwrap();
        let new = factory.create("02_v2/01_next.sql", 0, "").unwrap();
        let repeatable = factory.create("views/users.sql", 0, "").unwrap();
        let pre = factory.create("preprocessing/01_prep.sql", 0, "").unwrap();

        assert!(old.is_ignored());
        assert!(!at.is_ignored());
        assert!(!new.is_ignored());
        assert!(!repeatable.is_ignored());
        assert!(!pre.is_ignored());
    }

    #[test]
    fn test_checksum_is_lazy_and_stable() {
        let factory = default_factory();
        let a = factory.create("01_a.sql", 0, "CREATE TABLE a();").unwrap();
        let b = factory.create("02_b.sql", 0, "CREATE TABLE a();").unwrap();
        let c = factory.create("03_c.sql", 0, "DROP TABLE a;").unwrap();

        assert_eq!(a.checksum(), compute_checksum("CREATE TABLE a();"));
        assert_eq!(a.checksum().len(), 64);
        assert!(a.has_same_content(&b));
        assert!(!a.has_same_content(&c));
    }

    #[test]
    fn test_create_with_checksum() {
        let script = default_factory()
            .create_with_checksum("01_a.sql", 42, "abc")
            .unwrap();
        assert_eq!(script.checksum(), "abc");
        assert_eq!(script.content(), None);
        assert_eq!(script.last_modified_at(), 42);
    }

    #[test]
    fn test_equality_by_file_name() {
        let factory = default_factory();
        let a = factory.create("01_a.sql", 1, "one").unwrap();
        let b = factory.create("01_a.sql", 2, "two").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering_by_indexes_then_name() {
        let factory = default_factory();
        let mut scripts = vec![
            factory.create("views/b.sql", 0, "").unwrap(),
            factory.create("10_ten.sql", 0, "").unwrap(),
            factory.create("views/a.sql", 0, "").unwrap(),
            factory.create("02_two.sql", 0, "").unwrap(),
        ];
        scripts.sort();
        let names: Vec<_> = scripts.iter().map(Script::file_name).collect();
        assert_eq!(
            names,
            vec!["02_two.sql", "10_ten.sql", "views/a.sql", "views/b.sql"]
        );
    }

    #[test]
    fn test_renamed_keeps_checksum_and_timestamp() {
        let factory = default_factory();
        let original = factory.create("01_a.sql", 77, "SELECT 1;").unwrap();
        let renamed = factory.renamed(&original, "05_a.sql").unwrap();

        assert_eq!(renamed.file_name(), "05_a.sql");
        assert_eq!(renamed.indexes().to_canonical_string(), "5");
        assert_eq!(renamed.checksum(), original.checksum());
        assert_eq!(renamed.last_modified_at(), 77);
        assert_eq!(renamed.content_key(), original.content_key());
    }

    #[test]
    fn test_windows_separators_normalized() {
        let script = default_factory().create("01_a\\02_b.sql", 0, "").unwrap();
        assert_eq!(script.file_name(), "01_a/02_b.sql");
    }

    #[test]
    fn test_incremental_xor_repeatable() {
        let factory = default_factory();
        for name in ["01_a.sql", "a.sql", "x/02_b.sql", "x/y/c.sql", "preprocessing/p.sql"] {
            let script = factory.create(name, 0, "").unwrap();
            assert_ne!(script.is_incremental_script(), script.is_repeatable_script());
        }
    }
}
