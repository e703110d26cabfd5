//! Script locations.
//!
//! A location yields the raw material scripts are built from: a relative
//! path, a modification timestamp and the content. The engine does not care
//! where that comes from.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{MigrateResult, MigrationError};

/// A script file as found at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    /// Path relative to the location root, `/`-separated.
    pub relative_path: String,
    /// Last modification time in epoch milliseconds.
    pub last_modified_at: i64,
    /// Script content.
    pub content: String,
}

impl ScriptSource {
    /// Create a new script source.
    pub fn new(
        relative_path: impl Into<String>,
        last_modified_at: i64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            last_modified_at,
            content: content.into(),
        }
    }

    /// Whether the file extension is one of `extensions` (case-insensitive).
    pub fn has_extension(&self, extensions: &[String]) -> bool {
        has_extension(&self.relative_path, extensions)
    }
}

/// Something that can list script sources.
#[async_trait::async_trait]
pub trait ScriptLocation: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// All scripts whose extension is in `extensions`.
    async fn scripts(&self, extensions: &[String]) -> MigrateResult<Vec<ScriptSource>>;
}

/// Scripts stored in a directory tree.
#[derive(Debug, Clone)]
pub struct FileSystemLocation {
    root: PathBuf,
    name: String,
}

impl FileSystemLocation {
    /// Create a location rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root.display().to_string();
        Self { root, name }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl ScriptLocation for FileSystemLocation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scripts(&self, extensions: &[String]) -> MigrateResult<Vec<ScriptSource>> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(MigrationError::LocationNotFound(self.name.clone()));
        }

        let mut sources = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some(relative_path) = relative_path(&self.root, &path) else {
                    continue;
                };
                if !has_extension(&relative_path, extensions) {
                    continue;
                }

                let metadata = entry.metadata().await?;
                let last_modified_at = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or_default();
                let content = tokio::fs::read_to_string(&path).await?;

                tracing::debug!(location = %self.name, script = %relative_path, "found script");
                sources.push(ScriptSource {
                    relative_path,
                    last_modified_at,
                    content,
                });
            }
        }

        // read_dir order is platform dependent
        sources.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(sources)
    }
}

/// Scripts held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocation {
    name: String,
    sources: Vec<ScriptSource>,
}

impl InMemoryLocation {
    /// Create an empty in-memory location.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
        }
    }

    /// Add a script.
    pub fn with_script(
        mut self,
        relative_path: impl Into<String>,
        last_modified_at: i64,
        content: impl Into<String>,
    ) -> Self {
        self.sources
            .push(ScriptSource::new(relative_path, last_modified_at, content));
        self
    }

    /// Add a script in place.
    pub fn add(&mut self, source: ScriptSource) {
        self.sources.push(source);
    }
}

#[async_trait::async_trait]
impl ScriptLocation for InMemoryLocation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scripts(&self, extensions: &[String]) -> MigrateResult<Vec<ScriptSource>> {
        Ok(self
            .sources
            .iter()
            .filter(|s| s.has_extension(extensions))
            .cloned()
            .collect())
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn has_extension(path: &str, extensions: &[String]) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension)),
        _ => false,
    }
}
