use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::Table;
use crate::domain::error::{AppError, Result};

pub(super) fn read_first_sheet(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        AppError::SourceReadError(format!("Failed to open workbook {}: {}", path.display(), e))
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            AppError::SourceReadError(format!("No worksheet found in {}", path.display()))
        })?
        .map_err(|e| {
            AppError::SourceReadError(format!("Failed to read worksheet range: {}", e))
        })?;

    // The range starts at the first non-empty cell, not necessarily A1.
    let first_row_number = range
        .start()
        .map(|(row, _)| row as usize + 1)
        .unwrap_or(1);
    let leading_columns = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    let rows = range
        .rows()
        .map(|row| {
            let mut cells = vec![String::new(); leading_columns];
            cells.extend(row.iter().map(render_cell));
            cells
        })
        .collect();

    Ok(Table {
        first_row_number,
        rows,
    })
}

/// Integral floats render without a fractional part so numeric ids read as
/// `12`, not `12.0`.
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        other => other.to_string(),
    }
}
