//! Raw CSV persistence, JSON export and the console comparison table.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};

use crate::error::Result;
use crate::harness::Sample;
use crate::schema::BenchReport;
use crate::summary::{Pivot, Summary};

pub const CSV_HEADER: [&str; 5] = ["dataset", "variant", "operation", "repetition", "elapsed_ms"];

/// `results_YYYYMMDD_HHMMSS.<ext>`
pub fn timestamped_name(at: &DateTime<Local>, ext: &str) -> String {
    format!("results_{}.{ext}", at.format("%Y%m%d_%H%M%S"))
}

/// Write one CSV row per sample, in log order.
pub fn write_csv<W: Write>(samples: &[Sample], writer: W) -> Result<()> {
    // Header comes from the `Sample` field names.
    let mut wtr = csv::Writer::from_writer(writer);
    for s in samples {
        wtr.serialize(s)?;
    }
    if samples.is_empty() {
        wtr.write_record(CSV_HEADER)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Sample>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut samples = Vec::new();
    for row in rdr.deserialize() {
        samples.push(row?);
    }
    Ok(samples)
}

fn create_in(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Persist the raw samples to a timestamped CSV file under `dir`.
pub fn export_csv(samples: &[Sample], dir: &Path, at: &DateTime<Local>) -> Result<PathBuf> {
    let (path, file) = create_in(dir, &timestamped_name(at, "csv"))?;
    write_csv(samples, io::BufWriter::new(file))?;
    tracing::info!(path = %path.display(), rows = samples.len(), "CSV exported");
    Ok(path)
}

pub fn export_json(report: &BenchReport, dir: &Path, at: &DateTime<Local>) -> Result<PathBuf> {
    let (path, file) = create_in(dir, &timestamped_name(at, "json"))?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), "JSON exported");
    Ok(path)
}

/// Operations as rows, one column of mean milliseconds per variant.
pub fn render_pivot(pivot: &Pivot) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    let mut header = vec![Cell::new("operation")];
    header.extend(pivot.variants.iter().map(Cell::new));
    table.set_header(header);

    for (operation, cells) in &pivot.rows {
        let mut row = vec![Cell::new(operation)];
        row.extend(cells.iter().map(|cell| {
            let text = match cell {
                Some(ms) => format!("{ms:.2}"),
                None => "-".to_string(),
            };
            Cell::new(text).set_alignment(CellAlignment::Right)
        }));
        table.add_row(row);
    }
    table
}

/// One row per (variant, operation) with the full latency distribution.
pub fn render_stats(summary: &Summary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "variant", "operation", "n", "mean", "median", "min", "max", "std_dev",
    ]);

    for (variant, operation, stats) in summary.iter() {
        let mut row = vec![
            Cell::new(variant),
            Cell::new(operation),
            Cell::new(stats.count).set_alignment(CellAlignment::Right),
        ];
        row.extend(
            [
                stats.mean_ms,
                stats.median_ms,
                stats.min_ms,
                stats.max_ms,
                stats.std_dev_ms,
            ]
            .into_iter()
            .map(|ms| Cell::new(format!("{ms:.2}")).set_alignment(CellAlignment::Right)),
        );
        table.add_row(row);
    }
    table
}

pub fn print_stats(summary: &Summary) {
    println!("LATENCY STATISTICS (ms):");
    if summary.is_empty() {
        println!("(no samples recorded)");
        return;
    }
    println!("{}", render_stats(summary));
}

pub fn print_summary(pivot: &Pivot) {
    println!("RESULT SUMMARY:");
    if pivot.rows.is_empty() {
        println!("(no samples recorded)");
        return;
    }
    println!("{}", render_pivot(pivot));
}
