//! Dataset discovery and deterministic synthetic dataset generation.
//!
//! A dataset root holds one directory per dataset; the directory stem is the
//! dataset label used in fan-out runs.
//!
//! # Generated layout
//!
//! ```text
//! <root>/ds000/
//!   dataset_description.json
//!   task-<task>_bold.json                      dataset-level task metadata
//!   sub-01/anat/sub-01_T1w.nii.gz
//!   sub-01/func/sub-01_task-<task>_run-1_bold.nii.gz
//!   sub-01/func/sub-01_task-<task>_run-1_bold.json
//! ```
//!
//! Images are empty files: the benchmark only exercises layout queries.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use crate::error::{Error, Result};
use crate::harness::DatasetMap;

const TASK_NAMES: &[&str] = &[
    "rest", "motor", "nback", "faces", "language", "gambling", "emotion", "social",
];

const REPETITION_TIMES: &[f64] = &[0.72, 1.0, 1.5, 2.0, 2.5];

/// Immediate subdirectories of `root`, labelled by file stem and sorted by label.
///
/// A missing root is not fatal: it yields no datasets so that downstream
/// operations run over an empty set. Directories sharing a stem share a label;
/// the last one in sorted order is kept and a warning names the one dropped.
pub fn discover(root: &Path) -> Result<DatasetMap<PathBuf>> {
    if !root.exists() {
        tracing::warn!(root = %root.display(), "dataset root does not exist");
        return Ok(DatasetMap::new());
    }
    if !root.is_dir() {
        return Err(Error::NotADirectory(root.to_path_buf()));
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        let Some(label) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        found.push((label.to_string(), path.clone()));
    }
    found.sort();

    if found.is_empty() {
        tracing::warn!(root = %root.display(), "no datasets found");
    }

    let mut datasets = DatasetMap::with_capacity(found.len());
    for (label, path) in found {
        if let Some(shadowed) = datasets.insert(label.clone(), path) {
            tracing::warn!(
                dataset = %label,
                dropped = %shadowed.display(),
                "duplicate dataset label"
            );
        }
    }
    Ok(datasets)
}

/// Configuration for synthetic dataset generation.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub datasets: usize,
    pub subjects: usize,
    /// Tasks per dataset, capped at the number of built-in task names.
    pub tasks: usize,
    /// Maximum runs per subject and task; each pair gets between 1 and this many.
    pub runs: usize,
    pub seed: u64,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            datasets: 3,
            subjects: 20,
            tasks: 3,
            runs: 2,
            seed: 42,
        }
    }
}

/// Counts of what [`generate`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateStats {
    pub datasets: usize,
    pub images: usize,
    pub sidecars: usize,
}

fn per_dataset_seed(master_seed: u64, index: usize) -> u64 {
    master_seed
        .wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95)
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn touch(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)?;
    Ok(())
}

/// Write `config.datasets` synthetic datasets under `root`.
///
/// Output is a pure function of `config`: the same seed yields the same tree.
pub fn generate(root: &Path, config: &GenerateConfig) -> Result<GenerateStats> {
    let mut stats = GenerateStats::default();
    let tasks = config.tasks.clamp(1, TASK_NAMES.len());
    let max_runs = config.runs.max(1);

    for ds in 0..config.datasets {
        let mut rng = ChaCha8Rng::seed_from_u64(per_dataset_seed(config.seed, ds));
        let ds_root = root.join(format!("ds{ds:03}"));
        fs::create_dir_all(&ds_root)?;

        write_json(
            &ds_root.join("dataset_description.json"),
            &json!({
                "Name": format!("synthetic dataset {ds}"),
                "BIDSVersion": "1.8.0",
                "GeneratedBy": [{"Name": env!("CARGO_PKG_NAME"), "Version": env!("CARGO_PKG_VERSION")}],
            }),
        )?;

        let mut names: Vec<&str> = TASK_NAMES.to_vec();
        names.shuffle(&mut rng);
        names.truncate(tasks);
        names.sort_unstable();

        for task in &names {
            let tr = REPETITION_TIMES[rng.gen_range(0..REPETITION_TIMES.len())];
            write_json(
                &ds_root.join(format!("task-{task}_bold.json")),
                &json!({"TaskName": task, "RepetitionTime": tr}),
            )?;
            stats.sidecars += 1;
        }

        for sub in 1..=config.subjects {
            let sub_dir = ds_root.join(format!("sub-{sub:02}"));
            touch(&sub_dir.join(format!("anat/sub-{sub:02}_T1w.nii.gz")))?;
            stats.images += 1;

            for task in &names {
                let runs = rng.gen_range(1..=max_runs);
                for run in 1..=runs {
                    let stem = format!("sub-{sub:02}_task-{task}_run-{run}_bold");
                    touch(&sub_dir.join(format!("func/{stem}.nii.gz")))?;
                    stats.images += 1;

                    // Roughly half the runs override dataset-level metadata.
                    if rng.gen_bool(0.5) {
                        write_json(
                            &sub_dir.join(format!("func/{stem}.json")),
                            &json!({
                                "EchoTime": rng.gen_range(0.02..0.05),
                                "FlipAngle": rng.gen_range(50..90),
                            }),
                        )?;
                        stats.sidecars += 1;
                    }
                }
            }
        }

        stats.datasets += 1;
        tracing::debug!(dataset = %ds_root.display(), tasks = ?names, "generated dataset");
    }

    Ok(stats)
}
