//! Workbook intake via `calamine`.
//!
//! Only the first worksheet is read. Its first used row is the header row and
//! every following row becomes a data row of rendered cell strings.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};

/// Extensions handled by [`read_first_sheet`].
pub const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn read_first_sheet(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Workbook {path:?} contains no worksheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Reading sheet '{sheet_name}' of {path:?}"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let headers = header_row.iter().map(render_cell).collect::<Vec<_>>();

    let mut data = Vec::new();
    for row in rows {
        let mut cells = row.iter().map(render_cell).collect::<Vec<_>>();
        if cells.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        cells.resize(headers.len(), String::new());
        data.push(cells);
    }
    Ok((headers, data))
}

/// Renders a workbook cell the way it should take part in matching.
///
/// Whole numbers lose their fractional part so a phone stored as the number
/// `79990001111` compares equal to the text `"79990001111"` from another file.
pub fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => render_float(*value),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => render_float(value.as_f64()),
        },
        Data::DateTimeIso(value) | Data::DurationIso(value) => value.clone(),
        Data::Error(err) => format!("#{err:?}"),
    }
}

fn render_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
