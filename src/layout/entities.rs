//! Filename entity parsing.
//!
//! Layout filenames follow the `key-value_key-value_suffix.ext` convention,
//! e.g. `sub-01_ses-02_task-rest_run-1_bold.nii.gz`. Everything after the
//! first `.` is the extension, so `.nii.gz` stays whole.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Entity keys used by the query operations.
pub const SUBJECT: &str = "sub";
pub const SESSION: &str = "ses";
pub const TASK: &str = "task";
pub const RUN: &str = "run";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedName {
    pub entities: BTreeMap<String, String>,
    pub suffix: Option<String>,
    pub extension: String,
}

/// Split a filename into entities, suffix and extension.
///
/// Returns `None` for names with an empty stem (e.g. `.nii.gz`) or a
/// malformed entity such as `sub-`.
pub fn parse_filename(name: &str) -> Option<ParsedName> {
    let (stem, extension) = match name.find('.') {
        Some(idx) => (&name[..idx], name[idx..].to_string()),
        None => (name, String::new()),
    };
    if stem.is_empty() {
        return None;
    }

    let mut entities = BTreeMap::new();
    let mut suffix = None;
    for part in stem.split('_') {
        match part.split_once('-') {
            Some((key, value)) => {
                if key.is_empty() || value.is_empty() {
                    return None;
                }
                entities.insert(key.to_string(), value.to_string());
            }
            // Only the final bare component counts as the suffix.
            None => suffix = Some(part.to_string()),
        }
    }

    Some(ParsedName {
        entities,
        suffix,
        extension,
    })
}

/// A parsed file belonging to a layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutFile {
    pub path: PathBuf,
    pub entities: BTreeMap<String, String>,
    pub suffix: Option<String>,
    pub extension: String,
}

impl LayoutFile {
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let parsed = parse_filename(name)?;
        Some(Self {
            path: path.to_path_buf(),
            entities: parsed.entities,
            suffix: parsed.suffix,
            extension: parsed.extension,
        })
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }

    /// Path of the JSON sidecar sharing this file's stem.
    pub fn sidecar_path(&self) -> Option<PathBuf> {
        let name = self.path.file_name()?.to_str()?;
        let stem = name.strip_suffix(self.extension.as_str())?;
        Some(self.path.with_file_name(format!("{stem}.json")))
    }
}
