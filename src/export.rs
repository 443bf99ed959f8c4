//! Writing merge results.
//!
//! Merged rows go to `.xlsx` through `rust_xlsxwriter` or to delimited text
//! through the `csv` writer. Columns are the seven field labels in fixed
//! order, optionally followed by the source file name.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::{
    error::MergeError,
    field::Field,
    io_utils,
    merge::{Conflict, MergedRow},
    resolver::{ResolutionStats, Side},
};

pub const DEFAULT_EXTENSION: &str = "xlsx";
pub const SHEET_NAME: &str = "Merged Data";
const SOURCE_COLUMN: &str = "_source";

/// `merged_data_<YYYY-MM-DD>.<ext>`
pub fn default_output_name(date: NaiveDate, extension: &str) -> String {
    format!("merged_data_{}.{extension}", date.format("%Y-%m-%d"))
}

/// Picks the explicit output path, or the dated default inside `dir`.
pub fn resolve_output_path(output: Option<&Path>, dir: Option<&Path>, date: NaiveDate) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => dir
            .unwrap_or_else(|| Path::new("."))
            .join(default_output_name(date, DEFAULT_EXTENSION)),
    }
}

fn headers(include_source: bool) -> Vec<String> {
    let mut headers = Field::ALL
        .iter()
        .map(|field| field.label().to_string())
        .collect::<Vec<_>>();
    if include_source {
        headers.push(SOURCE_COLUMN.to_string());
    }
    headers
}

fn cells(row: &MergedRow, include_source: bool) -> Vec<String> {
    let mut cells = Field::ALL
        .iter()
        .map(|field| row.get(*field).unwrap_or("").to_string())
        .collect::<Vec<_>>();
    if include_source {
        cells.push(row.source.clone());
    }
    cells
}

/// Writes every merged row; the format follows the file extension.
pub fn write_merged(path: &Path, rows: &[MergedRow], include_source: bool) -> Result<()> {
    match io_utils::extension(path).as_deref() {
        Some("xlsx") => write_xlsx(path, rows, include_source)?,
        Some("csv") | Some("tsv") => write_delimited(path, rows, include_source)?,
        _ => return Err(MergeError::UnsupportedFormat(path.to_path_buf()).into()),
    }
    info!("Wrote {} merged row(s) to {:?}", rows.len(), path);
    Ok(())
}

fn write_xlsx(path: &Path, rows: &[MergedRow], include_source: bool) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(SHEET_NAME)
        .context("Naming merged worksheet")?;

    for (col, header) in headers(include_source).iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header.as_str(), &header_format)
            .context("Writing header row")?;
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let sheet_row = u32::try_from(row_idx + 1).context("Too many rows for a worksheet")?;
        for (col, value) in cells(row, include_source).iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            worksheet
                .write_string(sheet_row, col as u16, value.as_str())
                .with_context(|| format!("Writing merged row {}", row_idx + 1))?;
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("Saving workbook {path:?}"))
}

fn write_delimited(path: &Path, rows: &[MergedRow], include_source: bool) -> Result<()> {
    let delimiter = io_utils::resolve_delimiter(path, None);
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    writer
        .write_record(headers(include_source))
        .context("Writing header row")?;
    for (row_idx, row) in rows.iter().enumerate() {
        writer
            .write_record(cells(row, include_source))
            .with_context(|| format!("Writing merged row {}", row_idx + 1))?;
    }
    writer.flush().context("Flushing merged output")
}

/// Writes one line per conflict with its resolution state.
pub fn write_conflicts(path: &Path, conflicts: &[Conflict]) -> Result<()> {
    let delimiter = io_utils::resolve_delimiter(path, None);
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    writer
        .write_record([
            "index",
            "phone",
            "existing_source",
            "new_source",
            "state",
            "auto_resolved",
            "kept",
            "rule",
            "reason",
            "kept_source",
        ])
        .context("Writing conflict header")?;
    for (index, conflict) in conflicts.iter().enumerate() {
        writer
            .write_record([
                index.to_string(),
                conflict.phone.clone(),
                conflict.existing.source.clone(),
                conflict.new.source.clone(),
                if conflict.is_resolved() {
                    "resolved".to_string()
                } else {
                    "unresolved".to_string()
                },
                conflict.auto_resolved.to_string(),
                conflict
                    .kept
                    .map(|side| side.as_str().to_string())
                    .unwrap_or_default(),
                conflict
                    .rule
                    .map(|rule| rule.as_str().to_string())
                    .unwrap_or_default(),
                conflict.reason.clone(),
                conflict
                    .winner()
                    .map(|row| row.source.clone())
                    .unwrap_or_default(),
            ])
            .with_context(|| format!("Writing conflict {index}"))?;
    }
    writer.flush().context("Flushing conflict report")?;
    info!("Wrote {} conflict(s) to {:?}", conflicts.len(), path);
    Ok(())
}

/// Full machine-readable snapshot of a merge.
#[derive(Debug, Serialize)]
pub struct MergeReport<'a> {
    pub auto_resolve: bool,
    pub rows: &'a [MergedRow],
    pub conflicts: &'a [Conflict],
    pub stats: &'a ResolutionStats,
    pub taught_rules: &'a std::collections::BTreeMap<String, Side>,
}

pub fn write_report(path: &Path, report: &MergeReport<'_>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating report file {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report).context("Writing report JSON")
}
