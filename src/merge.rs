//! Folding mapped rows into one table keyed by phone number.
//!
//! [`merge_files()`] is a pure recomputation: it takes the full set of source
//! files (with their current mappings) and the auto-resolve toggle, and
//! rebuilds the merged rows and conflict list from nothing. Nothing from a
//! previous run is carried over.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use serde::Serialize;

use crate::{
    field::Field,
    resolver::{Resolution, ResolutionStats, Rule, Side, auto_resolve_conflict},
    source::SourceFile,
};

/// One output record: standard field values plus the file it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRow {
    #[serde(rename = "_source")]
    pub source: String,
    #[serde(flatten)]
    values: BTreeMap<Field, String>,
}

impl MergedRow {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builds the row for `row_index` of `source` through its column mapping.
    ///
    /// Unmapped columns are dropped. When two columns map to the same field
    /// the later column wins, even if its cell is blank.
    pub fn from_source(source: &SourceFile, row_index: usize) -> Self {
        let mut row = MergedRow::new(source.name.clone());
        for column_index in 0..source.columns.len() {
            if let Some(field) = source.mapping().field(column_index) {
                row.set(field, source.cell(row_index, column_index));
            }
        }
        row
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(|s| s.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// Dedup key; rows without a phone value are never deduplicated.
    pub fn phone(&self) -> Option<&str> {
        self.get(Field::Phone).filter(|phone| !phone.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictState {
    Unresolved,
    Resolved,
}

/// A collision between the row already merged for a phone and a later row
/// carrying the same phone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub phone: String,
    pub existing: MergedRow,
    pub new: MergedRow,
    pub state: ConflictState,
    pub auto_resolved: bool,
    pub kept: Option<Side>,
    pub rule: Option<Rule>,
    pub reason: String,
}

impl Conflict {
    pub fn new(phone: impl Into<String>, existing: MergedRow, new: MergedRow) -> Self {
        Self {
            phone: phone.into(),
            existing,
            new,
            state: ConflictState::Unresolved,
            auto_resolved: false,
            kept: None,
            rule: None,
            reason: String::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ConflictState::Resolved
    }

    pub(crate) fn mark_auto_resolved(&mut self, resolution: &Resolution) {
        self.state = ConflictState::Resolved;
        self.auto_resolved = true;
        self.kept = Some(resolution.keep);
        self.rule = Some(resolution.rule);
        self.reason = resolution.reason.to_string();
    }

    pub(crate) fn mark_manually_resolved(&mut self, keep: Side) {
        self.state = ConflictState::Resolved;
        self.kept = Some(keep);
        self.reason = format!("kept {} record by manual choice", keep.as_str());
    }

    /// The row that survives under this conflict's resolution, if any.
    pub fn winner(&self) -> Option<&MergedRow> {
        match self.kept? {
            Side::Existing => Some(&self.existing),
            Side::New => Some(&self.new),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub rows: Vec<MergedRow>,
    pub conflicts: Vec<Conflict>,
    /// Rules that fired during this run only.
    pub stats: ResolutionStats,
}

impl MergeOutcome {
    pub fn unresolved_count(&self) -> usize {
        self.conflicts.iter().filter(|c| !c.is_resolved()).count()
    }

    pub fn auto_resolved_count(&self) -> usize {
        self.conflicts.iter().filter(|c| c.auto_resolved).count()
    }

    pub fn row_index_for_phone(&self, phone: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.phone() == Some(phone))
    }
}

/// Rebuilds the merged table from every source in upload order.
pub fn merge_files(files: &[SourceFile], auto_resolve: bool) -> MergeOutcome {
    let upload_order = files.iter().map(|f| f.name.clone()).collect::<Vec<_>>();
    let mut outcome = MergeOutcome::default();
    // Phones are unique in `rows`, so this lookup is the first-match scan.
    let mut by_phone: HashMap<String, usize> = HashMap::new();

    for source in files {
        for row_index in 0..source.rows.len() {
            let row = MergedRow::from_source(source, row_index);
            let Some(phone) = row.phone().map(str::to_string) else {
                outcome.rows.push(row);
                continue;
            };
            let Some(&existing_index) = by_phone.get(&phone) else {
                by_phone.insert(phone, outcome.rows.len());
                outcome.rows.push(row);
                continue;
            };

            let existing = outcome.rows[existing_index].clone();
            let mut conflict = Conflict::new(phone, existing, row);
            if auto_resolve
                && let Some(resolution) =
                    auto_resolve_conflict(&conflict.existing, &conflict.new, &upload_order)
            {
                debug!(
                    "Auto-resolved phone {} via {}: kept {}",
                    conflict.phone,
                    resolution.rule,
                    resolution.keep.as_str()
                );
                if resolution.keep == Side::New {
                    outcome.rows[existing_index] = conflict.new.clone();
                }
                conflict.mark_auto_resolved(&resolution);
                outcome.stats.record(resolution.rule);
            }
            outcome.conflicts.push(conflict);
        }
    }

    info!(
        "Merged {} file(s) into {} row(s); {} conflict(s), {} auto-resolved",
        files.len(),
        outcome.rows.len(),
        outcome.conflicts.len(),
        outcome.auto_resolved_count()
    );
    outcome
}
