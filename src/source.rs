//! Parsed source files and their column mappings.
//!
//! A [`SourceFile`] is created once per input at intake time and never changes
//! afterwards except for its [`ColumnMapping`], which manual overrides and the
//! learner rewrite before merging.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::debug;
use serde::Serialize;

use crate::{
    error::MergeError,
    field::{Field, classify_by_keyword},
    io_utils, sheet,
};

const EMPTY_HEADER: &str = "__EMPTY";

/// How a column arrived at its current field assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingOrigin {
    Keyword,
    Learned,
    Manual,
}

impl MappingOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingOrigin::Keyword => "keyword",
            MappingOrigin::Learned => "learned",
            MappingOrigin::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub field: Option<Field>,
    pub origin: MappingOrigin,
}

/// Field assignment for each raw column, positionally aligned with
/// [`SourceFile::columns`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMapping {
    entries: Vec<MappingEntry>,
}

impl ColumnMapping {
    pub fn by_keyword(columns: &[String]) -> Self {
        let entries = columns
            .iter()
            .map(|column| MappingEntry {
                field: classify_by_keyword(column),
                origin: MappingOrigin::Keyword,
            })
            .collect();
        Self { entries }
    }

    pub fn from_entries(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    pub fn field(&self, column_index: usize) -> Option<Field> {
        self.entries.get(column_index).and_then(|entry| entry.field)
    }

    pub fn entry(&self, column_index: usize) -> Option<&MappingEntry> {
        self.entries.get(column_index)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn mapped_count(&self) -> usize {
        self.entries.iter().filter(|e| e.field.is_some()).count()
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    mapping: ColumnMapping,
}

impl SourceFile {
    /// Builds a source from already-parsed cells and maps every column with
    /// the keyword heuristic.
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let columns = unique_headers(headers);
        let mapping = ColumnMapping::by_keyword(&columns);
        Self {
            name: name.into(),
            columns,
            rows,
            mapping,
        }
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn set_mapping(&mut self, mapping: ColumnMapping) {
        self.mapping = mapping;
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Records a manual field choice for one column; `None` unmaps it.
    pub fn assign(&mut self, column: &str, field: Option<Field>) -> Result<(), MergeError> {
        let index = self
            .column_index(column)
            .ok_or_else(|| MergeError::UnknownColumn {
                file: self.name.clone(),
                column: column.to_string(),
            })?;
        self.mapping.entries[index] = MappingEntry {
            field,
            origin: MappingOrigin::Manual,
        };
        Ok(())
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

/// Options for reading source files from disk.
#[derive(Debug, Clone, Copy)]
pub struct IntakeOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for IntakeOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: encoding_rs::UTF_8,
        }
    }
}

pub fn load_source(path: &Path, options: &IntakeOptions) -> Result<SourceFile> {
    let name = display_name(path);
    let (headers, rows) = match io_utils::extension(path).as_deref() {
        Some(ext) if sheet::WORKBOOK_EXTENSIONS.contains(&ext) => sheet::read_first_sheet(path)?,
        Some("csv") | Some("tsv") | Some("txt") => {
            let delimiter = io_utils::resolve_delimiter(path, options.delimiter);
            io_utils::read_delimited(path, delimiter, options.encoding)?
        }
        _ => return Err(MergeError::UnsupportedFormat(path.to_path_buf()).into()),
    };
    debug!(
        "Loaded {:?}: {} column(s), {} row(s)",
        path,
        headers.len(),
        rows.len()
    );
    Ok(SourceFile::new(name, headers, rows))
}

/// Loads every input in order, rejecting two inputs that share a file name.
pub fn load_sources(paths: &[PathBuf], options: &IntakeOptions) -> Result<Vec<SourceFile>> {
    if paths.is_empty() {
        return Err(MergeError::EmptyInput.into());
    }
    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let source =
            load_source(path, options).with_context(|| format!("Loading source {path:?}"))?;
        if !seen.insert(source.name.clone()) {
            return Err(MergeError::DuplicateSource(source.name).into());
        }
        sources.push(source);
    }
    Ok(sources)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Names blank headers `__EMPTY` and suffixes repeats with `_1`, `_2`, ...
fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .map(|header| {
            let base = if header.trim().is_empty() {
                EMPTY_HEADER.to_string()
            } else {
                header
            };
            let mut candidate = base.clone();
            let mut counter = 1usize;
            while seen.contains(&candidate) {
                candidate = format!("{base}_{counter}");
                counter += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}
