//! Explicit merge session.
//!
//! A [`Session`] owns everything that lives for one run of the wizard: the
//! source files and their mappings, the training prefix size, the learned
//! pattern table, the auto-resolve toggle, cumulative rule statistics, the
//! rules taught by manual resolutions, and the current merge outcome.
//!
//! Every trigger (mapping edit, learning, toggle change) ends in
//! [`Session::recompute`], which rebuilds the outcome from scratch via
//! [`merge_files`]. Manual conflict decisions live only in the current
//! outcome, so the next recompute discards any that the heuristics cannot
//! re-derive.

use std::collections::{BTreeMap, HashSet};

use log::info;

use crate::{
    error::MergeError,
    field::Field,
    learner::{self, PatternTable},
    merge::{MergeOutcome, merge_files},
    resolver::{ResolutionStats, Side, auto_resolve_conflict},
    source::SourceFile,
};

/// Files the wizard asks the user to map by hand before learning.
pub const DEFAULT_TRAINING_COUNT: usize = 5;

const TAUGHT_PREFIX_CHARS: usize = 3;

#[derive(Debug, Clone)]
pub struct Session {
    files: Vec<SourceFile>,
    training_count: usize,
    patterns: PatternTable,
    auto_resolve: bool,
    stats: ResolutionStats,
    taught: BTreeMap<String, Side>,
    outcome: MergeOutcome,
}

impl Session {
    pub fn new(files: Vec<SourceFile>, training_count: usize) -> Result<Self, MergeError> {
        if training_count == 0 {
            return Err(MergeError::InvalidTrainingCount);
        }
        let mut seen = HashSet::new();
        for file in &files {
            if !seen.insert(file.name.as_str()) {
                return Err(MergeError::DuplicateSource(file.name.clone()));
            }
        }
        let mut session = Self {
            files,
            training_count,
            patterns: PatternTable::new(),
            auto_resolve: false,
            stats: ResolutionStats::default(),
            taught: BTreeMap::new(),
            outcome: MergeOutcome::default(),
        };
        session.recompute();
        Ok(session)
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn training_count(&self) -> usize {
        self.training_count
    }

    pub fn patterns(&self) -> &PatternTable {
        &self.patterns
    }

    pub fn auto_resolve_enabled(&self) -> bool {
        self.auto_resolve
    }

    /// Rule counts accumulated over every recompute since the last reset.
    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    /// Phone-prefix decisions recorded from manual resolutions.
    pub fn taught_rules(&self) -> &BTreeMap<String, Side> {
        &self.taught
    }

    pub fn outcome(&self) -> &MergeOutcome {
        &self.outcome
    }

    pub fn set_training_count(&mut self, training_count: usize) -> Result<(), MergeError> {
        if training_count == 0 {
            return Err(MergeError::InvalidTrainingCount);
        }
        self.training_count = training_count;
        Ok(())
    }

    /// Applies a manual column edit and re-merges.
    pub fn assign(
        &mut self,
        file: &str,
        column: &str,
        field: Option<Field>,
    ) -> Result<(), MergeError> {
        let source = self
            .files
            .iter_mut()
            .find(|source| source.name == file)
            .ok_or_else(|| MergeError::UnknownSource(file.to_string()))?;
        source.assign(column, field)?;
        self.recompute();
        Ok(())
    }

    /// Seeds the table with previously saved patterns, keeping their order.
    pub fn load_patterns(&mut self, table: &PatternTable) {
        for entry in table.entries() {
            self.patterns.insert(entry.pattern.clone(), entry.field);
        }
    }

    /// Learns from the training prefix, auto-maps every later file and
    /// re-merges. Returns the size of the pattern table.
    pub fn learn_from_mappings(&mut self) -> usize {
        let training_end = self.training_count.min(self.files.len());
        self.patterns.learn(&self.files[..training_end]);
        learner::auto_map_remaining(&self.patterns, &mut self.files, self.training_count);
        self.recompute();
        self.patterns.len()
    }

    /// Forgets learned patterns and returns later files to keyword mapping.
    pub fn reset_auto_mapping(&mut self) {
        self.patterns.clear();
        learner::reset_remaining(&mut self.files, self.training_count);
        self.recompute();
    }

    pub fn set_auto_resolve(&mut self, enabled: bool) {
        self.auto_resolve = enabled;
        self.recompute();
    }

    /// Rebuilds the merge outcome from the current files and toggle.
    pub fn recompute(&mut self) -> &MergeOutcome {
        self.outcome = merge_files(&self.files, self.auto_resolve);
        self.stats.absorb(&self.outcome.stats);
        &self.outcome
    }

    /// Settles one unresolved conflict by hand.
    ///
    /// Choosing the new row replaces the merged row for that phone. The choice
    /// is also recorded under the phone's first three characters.
    pub fn resolve_conflict(&mut self, index: usize, use_existing: bool) -> Result<(), MergeError> {
        let len = self.outcome.conflicts.len();
        let conflict = self
            .outcome
            .conflicts
            .get(index)
            .ok_or(MergeError::ConflictIndexOutOfRange { index, len })?;
        if conflict.is_resolved() {
            return Err(MergeError::ConflictAlreadyResolved(index));
        }

        let keep = if use_existing { Side::Existing } else { Side::New };
        let prefix = conflict
            .phone
            .chars()
            .take(TAUGHT_PREFIX_CHARS)
            .collect::<String>();
        self.taught.insert(format!("phone_{prefix}"), keep);

        if keep == Side::New {
            let replacement = conflict.new.clone();
            if let Some(row_index) = self.outcome.row_index_for_phone(&conflict.phone) {
                self.outcome.rows[row_index] = replacement;
            }
        }
        self.outcome.conflicts[index].mark_manually_resolved(keep);
        Ok(())
    }

    /// Runs the heuristics over every unresolved conflict, then switches
    /// auto-resolve on and re-merges from scratch.
    ///
    /// Returns how many conflicts the heuristics settled before the re-merge.
    pub fn apply_smart_resolution(&mut self) -> usize {
        let upload_order = self.upload_order();
        let decisions = self
            .outcome
            .conflicts
            .iter()
            .enumerate()
            .filter(|(_, conflict)| !conflict.is_resolved())
            .filter_map(|(index, conflict)| {
                auto_resolve_conflict(&conflict.existing, &conflict.new, &upload_order)
                    .map(|resolution| (index, resolution.keep))
            })
            .collect::<Vec<_>>();

        let mut resolved = 0usize;
        for (index, keep) in decisions {
            if self.resolve_conflict(index, keep == Side::Existing).is_ok() {
                resolved += 1;
            }
        }
        info!("Smart resolution settled {resolved} conflict(s)");

        self.auto_resolve = true;
        self.recompute();
        resolved
    }

    /// Turns auto-resolve off, forgets the pattern table, taught rules and
    /// statistics, and re-merges from the raw collision structure.
    ///
    /// Column mappings already derived from the table stay on their files;
    /// the next learning pass starts from an empty table.
    pub fn reset_auto_resolution(&mut self) {
        self.auto_resolve = false;
        self.patterns.clear();
        self.taught.clear();
        self.stats.clear();
        self.recompute();
    }

    fn upload_order(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }
}
