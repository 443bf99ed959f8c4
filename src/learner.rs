//! Column-mapping learner.
//!
//! Manually confirmed mappings from the first `training_count` files are
//! generalised into a [`PatternTable`]: every mapped column contributes its
//! full lower-cased name plus each of its longer tokens. The table is then
//! applied to the remaining files, first by exact name and then by substring
//! containment in either direction.
//!
//! Scan order matters. Entries are kept in first-insertion order and a later
//! registration of an existing key replaces the field in place, so substring
//! ties always resolve to the earliest-learned pattern.

use std::{
    fs::File,
    io::BufReader,
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    field::Field,
    source::{ColumnMapping, MappingEntry, MappingOrigin, SourceFile},
};

/// Tokens at or below this many characters are too generic to learn from.
const MIN_TOKEN_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    pub field: Field,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternTable {
    #[serde(default)]
    patterns: Vec<PatternEntry>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.patterns
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    pub fn get(&self, pattern: &str) -> Option<Field> {
        self.patterns
            .iter()
            .find(|entry| entry.pattern == pattern)
            .map(|entry| entry.field)
    }

    /// Registers `pattern`, overwriting the field of an existing key without
    /// moving it in scan order.
    pub fn insert(&mut self, pattern: impl Into<String>, field: Field) {
        let pattern = pattern.into();
        match self.patterns.iter_mut().find(|entry| entry.pattern == pattern) {
            Some(existing) => existing.field = field,
            None => self.patterns.push(PatternEntry { pattern, field }),
        }
    }

    /// Folds the confirmed mappings of `training` into this table.
    ///
    /// Files are visited in order and columns in column order; unmapped
    /// columns contribute nothing.
    pub fn learn(&mut self, training: &[SourceFile]) {
        let before = self.len();
        for source in training {
            for (index, column) in source.columns.iter().enumerate() {
                let Some(field) = source.mapping().field(index) else {
                    continue;
                };
                let lowered = column.to_lowercase();
                self.insert(lowered.clone(), field);
                for token in token_splitter().split(&lowered) {
                    if token.chars().count() > MIN_TOKEN_CHARS {
                        self.insert(token, field);
                    }
                }
            }
        }
        debug!(
            "Learned from {} file(s): {} -> {} pattern(s)",
            training.len(),
            before,
            self.len()
        );
    }

    /// Resolves a column name against the table.
    ///
    /// An exact lower-cased hit wins; otherwise the first pattern (in scan
    /// order) that contains the name or is contained by it.
    pub fn apply(&self, column: &str) -> Option<Field> {
        let lowered = column.to_lowercase();
        if let Some(field) = self.get(&lowered) {
            return Some(field);
        }
        self.patterns
            .iter()
            .find(|entry| lowered.contains(&entry.pattern) || entry.pattern.contains(&lowered))
            .map(|entry| entry.field)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening pattern file {path:?}"))?;
        let table: PatternTable =
            serde_yaml::from_reader(BufReader::new(file)).context("Parsing pattern YAML")?;
        Ok(table)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating pattern file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing pattern YAML")
    }
}

fn token_splitter() -> &'static Regex {
    static SPLITTER: OnceLock<Regex> = OnceLock::new();
    SPLITTER.get_or_init(|| Regex::new(r"[\s_-]+").expect("token separator pattern is valid"))
}

/// Learns a fresh table from the training files alone.
pub fn learn(training: &[SourceFile]) -> PatternTable {
    let mut table = PatternTable::new();
    table.learn(training);
    table
}

/// Remaps every file at index `training_count` or later from the table.
///
/// Columns no pattern matches become unmapped; the keyword heuristic is not
/// consulted here.
pub fn auto_map_remaining(table: &PatternTable, files: &mut [SourceFile], training_count: usize) {
    let mut remapped = 0usize;
    for source in files.iter_mut().skip(training_count) {
        let entries = source
            .columns
            .iter()
            .map(|column| MappingEntry {
                field: table.apply(column),
                origin: MappingOrigin::Learned,
            })
            .collect();
        source.set_mapping(ColumnMapping::from_entries(entries));
        remapped += 1;
    }
    info!(
        "Applied {} learned pattern(s) to {} file(s)",
        table.len(),
        remapped
    );
}

/// Reverts every file at index `training_count` or later to the keyword
/// heuristic.
pub fn reset_remaining(files: &mut [SourceFile], training_count: usize) {
    for source in files.iter_mut().skip(training_count) {
        let mapping = ColumnMapping::by_keyword(&source.columns);
        source.set_mapping(mapping);
    }
}
