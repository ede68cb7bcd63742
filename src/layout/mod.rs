//! Dataset layouts: the capability set under benchmark.
//!
//! A [`LayoutBackend`] constructs a [`Layout`] for one dataset directory.
//! Every backend answers the same queries; they differ only in how they get
//! there, which is what the benchmark compares.

pub mod entities;
pub mod indexed;
pub mod scan;

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
pub use entities::LayoutFile;
pub use indexed::IndexedBackend;
pub use scan::ScanBackend;

/// Merged JSON metadata for one file.
pub type Metadata = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Read JSON sidecars while loading instead of on first request.
    pub index_metadata: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            index_metadata: true,
        }
    }
}

/// Entity filters for file queries. Unset fields match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub subject: Option<String>,
    pub task: Option<String>,
    pub suffix: Option<String>,
    pub extension: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn matches(&self, file: &LayoutFile) -> bool {
        fn eq(want: &Option<String>, have: Option<&str>) -> bool {
            want.as_deref().map_or(true, |w| have == Some(w))
        }

        eq(&self.subject, file.entity(entities::SUBJECT))
            && eq(&self.task, file.entity(entities::TASK))
            && eq(&self.suffix, file.suffix.as_deref())
            && eq(&self.extension, Some(file.extension.as_str()))
    }
}

/// Constructs layouts. One backend per variant under comparison.
pub trait LayoutBackend {
    fn name(&self) -> &str;

    fn load(&self, root: &Path, options: &LoadOptions) -> Result<Box<dyn Layout>>;
}

/// Queries over a single dataset.
pub trait Layout {
    /// Sorted, de-duplicated subject labels.
    fn subjects(&self) -> Result<Vec<String>>;

    /// Sorted, de-duplicated task labels.
    fn tasks(&self) -> Result<Vec<String>>;

    fn subjects_for_task(&self, task: &str) -> Result<Vec<String>>;

    /// Files matching `query`, sorted by path.
    fn objects(&self, query: &Query) -> Result<Vec<LayoutFile>>;

    fn files(&self, query: &Query) -> Result<Vec<PathBuf>> {
        Ok(self
            .objects(query)?
            .into_iter()
            .map(|f| f.path)
            .collect())
    }

    /// Look up a single file by path. Relative paths are resolved against the dataset root.
    fn file(&self, path: &Path) -> Result<Option<LayoutFile>>;

    fn metadata(&self, file: &LayoutFile) -> Result<Metadata>;

    /// Top-level `sub-*` directories, sorted.
    fn subject_dirs(&self) -> Result<Vec<PathBuf>>;

    /// One-line human readable summary.
    fn describe(&self) -> Result<String>;
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
}

/// Every parseable file under `root`, sorted by path.
pub(crate) fn walk_files(root: &Path) -> Result<Vec<LayoutFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|source| Error::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(file) = LayoutFile::from_path(entry.path()) {
            files.push(file);
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

pub(crate) fn entity_values<'a>(
    files: impl IntoIterator<Item = &'a LayoutFile>,
    key: &str,
    task: Option<&str>,
) -> Vec<String> {
    let values: BTreeSet<&str> = files
        .into_iter()
        .filter(|f| task.map_or(true, |t| f.entity(entities::TASK) == Some(t)))
        .filter_map(|f| f.entity(key))
        .collect();
    values.into_iter().map(str::to_string).collect()
}

pub(crate) fn list_subject_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let is_subject = entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with("sub-"));
        if is_subject && entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub(crate) fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        root.join(path)
    } else {
        path.to_path_buf()
    }
}

fn read_json_object(path: &Path) -> Result<Option<Metadata>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(match value {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

/// Dataset-level `task-<task>_<suffix>.json` overlaid by the file's own sidecar.
pub(crate) fn resolve_metadata(root: &Path, file: &LayoutFile) -> Result<Metadata> {
    let mut merged = Metadata::new();
    if file.extension == ".json" {
        return Ok(merged);
    }

    let mut candidates = Vec::new();
    if let (Some(task), Some(suffix)) = (file.entity(entities::TASK), file.suffix.as_deref()) {
        candidates.push(root.join(format!("task-{task}_{suffix}.json")));
    }
    if let Some(sidecar) = file.sidecar_path() {
        candidates.push(sidecar);
    }

    for path in candidates {
        if let Some(map) = read_json_object(&path)? {
            merged.extend(map);
        }
    }
    Ok(merged)
}

pub(crate) fn describe_files(root: &Path, files: &[LayoutFile]) -> String {
    let subjects = entity_values(files, entities::SUBJECT, None).len();
    let sessions = entity_values(files, entities::SESSION, None).len();
    let runs = entity_values(files, entities::RUN, None).len();
    format!(
        "Layout: {} | Subjects: {subjects} | Sessions: {sessions} | Runs: {runs}",
        root.display()
    )
}
