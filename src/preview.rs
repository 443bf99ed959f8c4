//! Terminal rendering of mappings and merge results.
//!
//! The merged preview shows at most `row_limit` rows; the full table is still
//! what gets exported.

use std::fmt::Write as _;

use crate::{
    field::Field,
    merge::{Conflict, MergeOutcome},
    resolver::ResolutionStats,
    source::SourceFile,
    table,
};

pub const PREVIEW_ROW_LIMIT: usize = 100;

const SOURCE_HEADER: &str = "Источник";

/// One table row per (file, column) with its field and how it was assigned.
pub fn render_mappings(files: &[SourceFile], training_count: usize) -> String {
    let headers = ["file", "role", "column", "field", "origin"]
        .map(String::from)
        .to_vec();
    let mut rows = Vec::new();
    for (file_index, source) in files.iter().enumerate() {
        let role = if file_index < training_count {
            "training"
        } else {
            "auto"
        };
        for (column_index, column) in source.columns.iter().enumerate() {
            let entry = source.mapping().entry(column_index);
            let (field, origin) = match entry.and_then(|e| e.field.map(|f| (f, e.origin))) {
                Some((field, origin)) => (
                    format!("{} ({})", field.key(), field.label()),
                    origin.as_str().to_string(),
                ),
                None => ("-".to_string(), "-".to_string()),
            };
            rows.push(vec![
                source.name.clone(),
                role.to_string(),
                column.clone(),
                field,
                origin,
            ]);
        }
    }
    table::render_table(&headers, &rows)
}

pub fn render_merge(
    outcome: &MergeOutcome,
    stats: &ResolutionStats,
    auto_resolve: bool,
    row_limit: usize,
) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Total records: {}  Conflicts: {}  Auto-resolved: {}",
        outcome.rows.len(),
        outcome.unresolved_count(),
        outcome.auto_resolved_count()
    );
    if auto_resolve && !stats.is_empty() {
        let _ = writeln!(output, "Resolution statistics ({} total):", stats.total());
        for (rule, count) in stats.iter() {
            let _ = writeln!(output, "  {} ({}): {}", rule, rule.description(), count);
        }
    }
    let _ = writeln!(output);

    let mut headers = Field::ALL
        .iter()
        .map(|field| field.label().to_string())
        .collect::<Vec<_>>();
    headers.push(SOURCE_HEADER.to_string());
    let rows = outcome
        .rows
        .iter()
        .take(row_limit)
        .map(|row| {
            let mut cells = Field::ALL
                .iter()
                .map(|field| row.get(*field).unwrap_or("").to_string())
                .collect::<Vec<_>>();
            cells.push(row.source.clone());
            cells
        })
        .collect::<Vec<_>>();
    output.push_str(&table::render_table(&headers, &rows));
    if outcome.rows.len() > row_limit {
        let _ = writeln!(
            output,
            "Showing first {} of {} records",
            row_limit,
            outcome.rows.len()
        );
    }

    if !outcome.conflicts.is_empty() {
        let _ = writeln!(output);
        output.push_str(&render_conflicts(&outcome.conflicts));
    }
    output
}

pub fn render_conflicts(conflicts: &[Conflict]) -> String {
    let headers = ["#", "phone", "existing", "new", "status", "kept", "reason"]
        .map(String::from)
        .to_vec();
    let rows = conflicts
        .iter()
        .enumerate()
        .map(|(index, conflict)| {
            let status = match (conflict.is_resolved(), conflict.auto_resolved) {
                (true, true) => "auto",
                (true, false) => "manual",
                (false, _) => "unresolved",
            };
            vec![
                index.to_string(),
                conflict.phone.clone(),
                conflict.existing.source.clone(),
                conflict.new.source.clone(),
                status.to_string(),
                conflict
                    .kept
                    .map(|side| side.as_str().to_string())
                    .unwrap_or_default(),
                conflict.reason.clone(),
            ]
        })
        .collect::<Vec<_>>();
    table::render_table(&headers, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_files;

    fn numbered_file(rows: usize) -> SourceFile {
        SourceFile::new(
            "big.csv",
            vec!["phone".into()],
            (0..rows).map(|i| vec![format!("{i:011}")]).collect(),
        )
    }

    #[test]
    fn truncates_preview_but_reports_total() {
        let outcome = merge_files(&[numbered_file(150)], false);
        let rendered = render_merge(&outcome, &ResolutionStats::default(), false, PREVIEW_ROW_LIMIT);
        assert!(rendered.starts_with("Total records: 150  Conflicts: 0  Auto-resolved: 0"));
        assert!(rendered.contains("Showing first 100 of 150 records"));
        assert!(rendered.contains("00000000099"));
        assert!(!rendered.contains("00000000100"));
    }

    #[test]
    fn stats_are_listed_only_with_auto_resolve() {
        let files = [
            SourceFile::new("a.csv", vec!["phone".into()], vec![vec!["1".into()]]),
            SourceFile::new("b.csv", vec!["phone".into()], vec![vec!["1".into()]]),
        ];
        let outcome = merge_files(&files, true);
        let with_stats = render_merge(&outcome, &outcome.stats, true, PREVIEW_ROW_LIMIT);
        assert!(with_stats.contains("Resolution statistics (1 total):"));
        assert!(with_stats.contains("newest_source (by source recency): 1"));
        assert!(with_stats.contains("auto"));

        let without = render_merge(&outcome, &outcome.stats, false, PREVIEW_ROW_LIMIT);
        assert!(!without.contains("Resolution statistics"));
    }

    #[test]
    fn mapping_view_marks_training_files() {
        let files = [
            SourceFile::new("a.csv", vec!["Телефон".into(), "x".into()], Vec::new()),
            SourceFile::new("b.csv", vec!["ФИО".into()], Vec::new()),
        ];
        let rendered = render_mappings(&files, 1);
        assert!(rendered.contains("a.csv  training  Телефон  phone (Телефон)  keyword"));
        assert!(rendered.contains("b.csv  auto"));
    }
}
