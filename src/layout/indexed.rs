//! Layout that indexes the whole dataset up front.
//!
//! Loading walks the tree once and, with [`LoadOptions::index_metadata`],
//! resolves every file's metadata. Queries then filter the in-memory index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{
    describe_files, entities, entity_values, list_subject_dirs, resolve_metadata, resolve_path,
    walk_files, Layout, LayoutBackend, LayoutFile, LoadOptions, Metadata, Query,
};
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Default)]
pub struct IndexedBackend;

impl LayoutBackend for IndexedBackend {
    fn name(&self) -> &str {
        "indexed"
    }

    fn load(&self, root: &Path, options: &LoadOptions) -> Result<Box<dyn Layout>> {
        Ok(Box::new(IndexedLayout::load(root, options)?))
    }
}

pub struct IndexedLayout {
    root: PathBuf,
    files: Vec<LayoutFile>,
    subject_dirs: Vec<PathBuf>,
    metadata: HashMap<PathBuf, Metadata>,
}

impl IndexedLayout {
    pub fn load(root: &Path, options: &LoadOptions) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }

        let files = walk_files(root)?;
        let subject_dirs = list_subject_dirs(root)?;

        let mut metadata = HashMap::new();
        if options.index_metadata {
            for file in files.iter().filter(|f| f.extension != ".json") {
                metadata.insert(file.path.clone(), resolve_metadata(root, file)?);
            }
        }

        tracing::debug!(
            root = %root.display(),
            files = files.len(),
            indexed_metadata = metadata.len(),
            "indexed layout"
        );

        Ok(Self {
            root: root.to_path_buf(),
            files,
            subject_dirs,
            metadata,
        })
    }
}

impl Layout for IndexedLayout {
    fn subjects(&self) -> Result<Vec<String>> {
        Ok(entity_values(&self.files, entities::SUBJECT, None))
    }

    fn tasks(&self) -> Result<Vec<String>> {
        Ok(entity_values(&self.files, entities::TASK, None))
    }

    fn subjects_for_task(&self, task: &str) -> Result<Vec<String>> {
        Ok(entity_values(&self.files, entities::SUBJECT, Some(task)))
    }

    fn objects(&self, query: &Query) -> Result<Vec<LayoutFile>> {
        Ok(self
            .files
            .iter()
            .filter(|f| query.matches(f))
            .cloned()
            .collect())
    }

    fn file(&self, path: &Path) -> Result<Option<LayoutFile>> {
        let path = resolve_path(&self.root, path);
        Ok(self
            .files
            .binary_search_by(|f| f.path.cmp(&path))
            .ok()
            .map(|idx| self.files[idx].clone()))
    }

    fn metadata(&self, file: &LayoutFile) -> Result<Metadata> {
        match self.metadata.get(&file.path) {
            Some(md) => Ok(md.clone()),
            None => resolve_metadata(&self.root, file),
        }
    }

    fn subject_dirs(&self) -> Result<Vec<PathBuf>> {
        Ok(self.subject_dirs.clone())
    }

    fn describe(&self) -> Result<String> {
        Ok(describe_files(&self.root, &self.files))
    }
}
