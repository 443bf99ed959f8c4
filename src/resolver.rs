//! Automatic conflict resolution heuristics.
//!
//! When two rows share a phone number, [`auto_resolve_conflict()`] tries four
//! rules in a fixed order and the first one that applies decides which row
//! survives:
//!
//! 1. `most_complete`: one row has more than two extra populated fields.
//! 2. `best_quality`: the new row's [`quality_score()`] beats the existing
//!    row's by more than 0.2.
//! 3. `source_priority`: the new row comes from a priority-marked file and
//!    the existing row does not. There is no mirror rule for the existing row.
//! 4. `newest_source`: the new row's file was supplied later.
//!
//! If nothing applies the conflict is left for a manual decision.

use std::{collections::BTreeMap, fmt, sync::OnceLock};

use regex::Regex;
use serde::Serialize;

use crate::{
    field::{Field, is_populated},
    merge::MergedRow,
};

const COMPLETENESS_MARGIN: usize = 2;
const QUALITY_MARGIN: f64 = 0.2;
const PRIORITY_MARKERS: [&str; 3] = ["main", "primary", "основной"];

const VALID_PHONE_BONUS: f64 = 0.5;
const FULL_NAME_BONUS: f64 = 0.3;
const DETAILED_TIME_BONUS: f64 = 0.2;
const DETAILED_TIME_MIN_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    MostComplete,
    BestQuality,
    SourcePriority,
    NewestSource,
}

impl Rule {
    pub fn as_str(self) -> &'static str {
        match self {
            Rule::MostComplete => "most_complete",
            Rule::BestQuality => "best_quality",
            Rule::SourcePriority => "source_priority",
            Rule::NewestSource => "newest_source",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Rule::MostComplete => "by completeness",
            Rule::BestQuality => "by data quality",
            Rule::SourcePriority => "by source priority",
            Rule::NewestSource => "by source recency",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two colliding rows survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Existing,
    New,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Existing => "existing",
            Side::New => "new",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub keep: Side,
    pub rule: Rule,
    pub reason: &'static str,
}

impl Resolution {
    fn new(keep: Side, rule: Rule, reason: &'static str) -> Self {
        Self { keep, rule, reason }
    }
}

/// How often each rule has fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolutionStats {
    counts: BTreeMap<Rule, usize>,
}

impl ResolutionStats {
    pub fn record(&mut self, rule: Rule) {
        *self.counts.entry(rule).or_insert(0) += 1;
    }

    pub fn count(&self, rule: Rule) -> usize {
        self.counts.get(&rule).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rule, usize)> + '_ {
        self.counts.iter().map(|(rule, count)| (*rule, *count))
    }

    /// Adds another run's counts onto these.
    pub fn absorb(&mut self, other: &ResolutionStats) {
        for (rule, count) in other.iter() {
            *self.counts.entry(rule).or_insert(0) += count;
        }
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// Number of populated standard fields in a row.
pub fn completeness(row: &MergedRow) -> usize {
    row.values().filter(|(_, value)| is_populated(value)).count()
}

/// Per-row data quality, averaged over the seven standard fields.
///
/// Each populated field is worth 1.0, with bonuses for a well-formed phone
/// (+0.5), a multi-word name (+0.3) and a detailed time value (+0.2). The
/// result is not capped at 1.0; a perfect row scores 8/7.
pub fn quality_score(row: &MergedRow) -> f64 {
    let mut score = 0.0;
    for field in Field::ALL {
        let Some(value) = row.get(field).filter(|value| is_populated(value)) else {
            continue;
        };
        score += 1.0;
        match field {
            Field::Phone if phone_pattern().is_match(value) => score += VALID_PHONE_BONUS,
            Field::Name if value.split(' ').count() >= 2 => score += FULL_NAME_BONUS,
            Field::Time if value.chars().count() > DETAILED_TIME_MIN_CHARS => {
                score += DETAILED_TIME_BONUS
            }
            _ => {}
        }
    }
    score / Field::ALL.len() as f64
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("phone pattern is valid"))
}

pub fn has_priority_marker(source: &str) -> bool {
    let lowered = source.to_lowercase();
    PRIORITY_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Picks the surviving row for a phone collision, or `None` to defer.
///
/// `upload_order` lists source file names in the order they were supplied;
/// a source missing from it ranks before every listed file.
pub fn auto_resolve_conflict(
    existing: &MergedRow,
    new: &MergedRow,
    upload_order: &[String],
) -> Option<Resolution> {
    let existing_fields = completeness(existing);
    let new_fields = completeness(new);
    if new_fields > existing_fields + COMPLETENESS_MARGIN {
        return Some(Resolution::new(
            Side::New,
            Rule::MostComplete,
            "new record is more complete",
        ));
    }
    if existing_fields > new_fields + COMPLETENESS_MARGIN {
        return Some(Resolution::new(
            Side::Existing,
            Rule::MostComplete,
            "existing record is more complete",
        ));
    }

    if quality_score(new) > quality_score(existing) + QUALITY_MARGIN {
        return Some(Resolution::new(
            Side::New,
            Rule::BestQuality,
            "new record has better data quality",
        ));
    }

    if has_priority_marker(&new.source) && !has_priority_marker(&existing.source) {
        return Some(Resolution::new(
            Side::New,
            Rule::SourcePriority,
            "new record comes from a priority source",
        ));
    }

    if upload_rank(upload_order, &new.source) > upload_rank(upload_order, &existing.source) {
        return Some(Resolution::new(
            Side::New,
            Rule::NewestSource,
            "new record comes from a newer source file",
        ));
    }

    None
}

fn upload_rank(upload_order: &[String], source: &str) -> Option<usize> {
    upload_order.iter().position(|name| name == source)
}
