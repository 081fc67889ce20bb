//! End-to-end comparison pipeline
//!
//! Stages run strictly in sequence, each to completion:
//!
//! 1. Prepare the scratch workspace (wipe + create dataset dirs)
//! 2. Ingest left, ingest right
//! 3. Normalize + sort left, then right
//! 4. Persist left, persist right (in-memory tables are dropped afterwards)
//! 5. Reload left, reload right
//! 6. Diff and write the report
//!
//! Any error aborts the run before the report is written.

use crate::chunk_store;
use crate::config::{InputConfig, PipelineConfig};
use crate::diff::{diff, DiffReport};
use crate::error::{PipelineError, Result};
use crate::ingest::{ingest_with_stats, IngestStats};
use crate::normalize::{is_sorted_by_key, normalize};
use crate::progress::ProgressManager;
use crate::table::Table;
use crate::workspace::{self, Dataset};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Per-input outcome
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub input: PathBuf,
    pub chunk_dir: PathBuf,
    pub ingest: IngestStats,
    pub chunks: usize,
    pub rows: usize,
    pub columns: usize,
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub left: DatasetSummary,
    pub right: DatasetSummary,
    pub report_path: PathBuf,
    pub identical: bool,
    pub differing_cells: usize,
    pub elapsed_ms: u128,
}

fn ingest_input(input: &InputConfig, chunk_size: usize) -> Result<(Table, IngestStats)> {
    ingest_with_stats(
        &input.path,
        input.delimiter_byte()?,
        input.encoding()?,
        chunk_size,
    )
}

fn persist_dataset(
    table: &Table,
    dataset: &Dataset,
    config: &PipelineConfig,
    progress: &ProgressManager,
) -> Result<usize> {
    let total = chunk_store::chunk_count(table.row_count(), config.chunk_size);
    let bar = progress.chunk_bar(total as u64, &format!("Writing {}", dataset.name));
    let paths = chunk_store::persist(
        table,
        config.chunk_size,
        &dataset.dir,
        &config.output_prefix,
        bar.as_ref(),
    )?;
    info!("persisted {} chunk(s) to {}", paths.len(), dataset.dir.display());
    Ok(paths.len())
}

fn reload_dataset(dataset: &Dataset, progress: &ProgressManager) -> Result<Table> {
    let bar = progress.chunk_bar(0, &format!("Reading {}", dataset.name));
    let table = chunk_store::reload(&dataset.dir, bar.as_ref())?;
    println!(
        "{} rows and {} columns on {}.",
        table.row_count(),
        table.column_count(),
        dataset.dir.display()
    );
    Ok(table)
}

/// Write the text report, replacing any previous one
pub fn write_report(path: &Path, report: &DiffReport) -> Result<()> {
    std::fs::write(path, report.render()).map_err(|e| PipelineError::io(path, e))
}

/// Write the report as pretty JSON
pub fn write_json_report(path: &Path, report: &DiffReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        PipelineError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))
}

/// Run the whole comparison described by `config`
pub fn run(config: &PipelineConfig, progress: &ProgressManager) -> Result<RunSummary> {
    config.validate()?;
    let start = Instant::now();

    println!("\n{}", "═".repeat(60));
    println!("TABLE DIFF");
    println!("{}", "═".repeat(60));
    println!("  Left:       {}", config.left.path.display());
    println!("  Right:      {}", config.right.path.display());
    println!("  Chunk size: {}", config.chunk_size);
    println!("  Scratch:    {}", config.temp_dir.display());

    let (left_ds, right_ds) = workspace::prepare(config)?;

    let (left, left_ingest) = ingest_input(&config.left, config.chunk_size)?;
    let (right, right_ingest) = ingest_input(&config.right, config.chunk_size)?;

    let left = normalize(left, config.sort_key_column_index)?;
    let right = normalize(right, config.sort_key_column_index)?;
    debug_assert!(is_sorted_by_key(&left, config.sort_key_column_index));
    debug_assert!(is_sorted_by_key(&right, config.sort_key_column_index));

    println!("Processing chunks...");
    let left_chunks = persist_dataset(&left, &left_ds, config, progress)?;
    let right_chunks = persist_dataset(&right, &right_ds, config, progress)?;
    // Only the on-disk copies survive past this point
    drop(left);
    drop(right);

    println!("Reading chunks...");
    let left = reload_dataset(&left_ds, progress)?;
    let right = reload_dataset(&right_ds, progress)?;

    let report = diff(&left, &right);
    write_report(&config.report_path, &report)?;
    if let Some(json_path) = &config.json_report_path {
        write_json_report(json_path, &report)?;
    }

    let summary = RunSummary {
        left: DatasetSummary {
            input: config.left.path.clone(),
            chunk_dir: left_ds.dir,
            ingest: left_ingest,
            chunks: left_chunks,
            rows: left.row_count(),
            columns: left.column_count(),
        },
        right: DatasetSummary {
            input: config.right.path.clone(),
            chunk_dir: right_ds.dir,
            ingest: right_ingest,
            chunks: right_chunks,
            rows: right.row_count(),
            columns: right.column_count(),
        },
        report_path: config.report_path.clone(),
        identical: report.is_identical(),
        differing_cells: report.differing_cells(),
        elapsed_ms: start.elapsed().as_millis(),
    };

    println!("{}", "─".repeat(60));
    println!("  ✅ Report written to {}", config.report_path.display());
    if summary.identical {
        println!("  Tables match");
    } else {
        println!("  Differing cells: {}", summary.differing_cells);
    }
    Ok(summary)
}
