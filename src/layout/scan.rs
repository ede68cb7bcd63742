//! Layout that keeps no index and walks the dataset on every query.

use std::path::{Path, PathBuf};

use super::{
    describe_files, entities, entity_values, list_subject_dirs, resolve_metadata, resolve_path,
    walk_files, Layout, LayoutBackend, LayoutFile, LoadOptions, Metadata, Query,
};
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Default)]
pub struct ScanBackend;

impl LayoutBackend for ScanBackend {
    fn name(&self) -> &str {
        "scan"
    }

    // Nothing is cached, so `index_metadata` has no effect here.
    fn load(&self, root: &Path, _options: &LoadOptions) -> Result<Box<dyn Layout>> {
        Ok(Box::new(ScanLayout::open(root)?))
    }
}

pub struct ScanLayout {
    root: PathBuf,
}

impl ScanLayout {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn walk(&self) -> Result<Vec<LayoutFile>> {
        walk_files(&self.root)
    }
}

impl Layout for ScanLayout {
    fn subjects(&self) -> Result<Vec<String>> {
        Ok(entity_values(&self.walk()?, entities::SUBJECT, None))
    }

    fn tasks(&self) -> Result<Vec<String>> {
        Ok(entity_values(&self.walk()?, entities::TASK, None))
    }

    fn subjects_for_task(&self, task: &str) -> Result<Vec<String>> {
        Ok(entity_values(&self.walk()?, entities::SUBJECT, Some(task)))
    }

    fn objects(&self, query: &Query) -> Result<Vec<LayoutFile>> {
        let mut files = self.walk()?;
        files.retain(|f| query.matches(f));
        Ok(files)
    }

    fn file(&self, path: &Path) -> Result<Option<LayoutFile>> {
        let path = resolve_path(&self.root, path);
        Ok(self.walk()?.into_iter().find(|f| f.path == path))
    }

    fn metadata(&self, file: &LayoutFile) -> Result<Metadata> {
        resolve_metadata(&self.root, file)
    }

    fn subject_dirs(&self) -> Result<Vec<PathBuf>> {
        list_subject_dirs(&self.root)
    }

    fn describe(&self) -> Result<String> {
        Ok(describe_files(&self.root, &self.walk()?))
    }
}
