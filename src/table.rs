//! Plain-text elastic tables for terminal previews.

use std::fmt::Write as _;

use itertools::Itertools;

/// Renders `rows` under `headers` as space-aligned columns with a dashed
/// separator. Cells beyond the header count are ignored.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| cell_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", render_line(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", render_line(&separator, &separator_widths));
    for row in rows {
        let _ = writeln!(output, "{}", render_line(row, &widths));
    }
    output
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let line = widths
        .iter()
        .enumerate()
        .map(|(idx, width)| {
            let cell = flatten(cells.get(idx).map(|s| s.as_str()).unwrap_or(""));
            let padding = width.saturating_sub(cell_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .join("  ");
    line.trim_end().to_string()
}

/// Width in characters; Cyrillic labels are one column per character.
fn cell_width(value: &str) -> usize {
    value.chars().count()
}

fn flatten(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}
