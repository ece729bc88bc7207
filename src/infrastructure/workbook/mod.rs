//! Reads a test-case workbook into raw rows.
//!
//! Spreadsheets go through `calamine` (first worksheet only), `.csv` files
//! through the `csv` crate. The first row is the header; header names are
//! matched case-insensitively against the required columns.

use std::path::Path;

use tracing::{debug, info};

use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{non_blank, RawRow, REQUIRED_COLUMNS};

mod csv_reader;
mod spreadsheet;

/// Cells of one sheet, header row included, as display strings.
pub(crate) struct Table {
    /// 1-based sheet row of `rows[0]`.
    pub first_row_number: usize,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Spreadsheet,
    Csv,
}

fn detect_format(path: &Path) -> Result<SourceFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceFormat::Spreadsheet),
        "csv" => Ok(SourceFormat::Csv),
        other => Err(AppError::SourceReadError(format!(
            "Unsupported workbook format '{}': {}",
            other,
            path.display()
        ))),
    }
}

pub fn read_workbook(path: &Path) -> Result<Vec<RawRow>> {
    if !path.exists() {
        return Err(AppError::SourceNotFound(format!(
            "File not found: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(AppError::SourceReadError(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }

    let format = detect_format(path)?;
    let table = match format {
        SourceFormat::Spreadsheet => spreadsheet::read_first_sheet(path)?,
        SourceFormat::Csv => csv_reader::read_csv(path)?,
    };

    let rows = map_rows(table)?;
    info!(
        path = %path.display(),
        format = ?format,
        rows = rows.len(),
        "Read workbook"
    );
    Ok(rows)
}

pub(crate) fn map_rows(table: Table) -> Result<Vec<RawRow>> {
    let mut rows = table.rows.into_iter();
    let header = rows.next().ok_or_else(|| {
        AppError::SourceReadError("Workbook has no header row".to_string())
    })?;

    let positions = locate_columns(&header)?;
    let mut out = Vec::new();
    for (offset, cells) in rows.enumerate() {
        let cell = |column: usize| -> Option<String> {
            positions[column]
                .and_then(|pos| cells.get(pos))
                .and_then(|value| non_blank(Some(value.as_str())))
        };

        let row = RawRow {
            row_number: table.first_row_number + offset + 1,
            id: cell(0),
            direction: cell(1),
            section: cell(2),
            name: cell(3),
            preconditions: cell(4),
            steps: cell(5),
            postconditions: cell(6),
            expected_result: cell(7),
        };

        if is_blank(&row) {
            debug!(row = row.row_number, "Skipping blank row");
            continue;
        }
        out.push(row);
    }
    Ok(out)
}

/// Position of every required column in the header, in `REQUIRED_COLUMNS` order.
fn locate_columns(header: &[String]) -> Result<[Option<usize>; 8]> {
    let mut positions = [None; 8];
    for (i, column) in REQUIRED_COLUMNS.iter().enumerate() {
        positions[i] = header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(column));
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .zip(positions.iter())
        .filter(|(_, pos)| pos.is_none())
        .map(|(column, _)| *column)
        .collect();

    if !missing.is_empty() {
        return Err(AppError::SchemaError(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }
    Ok(positions)
}

fn is_blank(row: &RawRow) -> bool {
    [
        &row.id,
        &row.direction,
        &row.section,
        &row.name,
        &row.preconditions,
        &row.steps,
        &row.postconditions,
        &row.expected_result,
    ]
    .iter()
    .all(|cell| cell.is_none())
}
