use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use super::Table;
use crate::domain::error::{AppError, Result};

pub(super) fn read_csv(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|e| {
        AppError::SourceReadError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let content = decode(&bytes);
    let delimiter = detect_delimiter(&content);
    debug!(delimiter = %(delimiter as char).escape_default(), "Detected CSV delimiter");

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            AppError::SourceReadError(format!("Failed to parse CSV row {}: {}", index + 1, e))
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(AppError::SourceReadError(format!(
            "{} is empty",
            path.display()
        )));
    }

    Ok(Table {
        first_row_number: 1,
        rows,
    })
}

/// UTF-8 (BOM stripped) when valid, otherwise Windows-1251, the usual
/// encoding of spreadsheets exported on Russian-locale machines.
fn decode(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    let (text, _, _) = encoding_rs::WINDOWS_1251.decode(bytes);
    text.into_owned()
}

/// Picks the most frequent of `,`, `;` and tab on the header line, ignoring
/// quoted text. Defaults to `,`.
pub(super) fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    let mut counts = [(b',', 0usize), (b';', 0), (b'\t', 0)];
    let mut in_quotes = false;

    for c in header.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        for (delimiter, count) in counts.iter_mut() {
            if c == *delimiter as char {
                *count += 1;
            }
        }
    }

    counts
        .iter()
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(delimiter, _)| *delimiter)
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("Id,Direction,Section"), b',');
        assert_eq!(detect_delimiter("Id;Direction;\"a,b,c\""), b';');
        assert_eq!(detect_delimiter("Id\tDirection\tSection"), b'\t');
        assert_eq!(detect_delimiter("Id"), b',');
    }

    #[test]
    fn test_decode_handles_bom_and_cp1251() {
        assert_eq!(decode(b"\xEF\xBB\xBFId"), "Id");
        // "Шаг" in Windows-1251.
        assert_eq!(decode(&[0xD8, 0xE0, 0xE3]), "Шаг");
    }

    #[test]
    fn test_quoted_multiline_cells_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.csv");
        std::fs::write(&path, "Id,Steps\n1,\"Open\nthen submit\"\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][1], "Open\nthen submit");
    }

    #[test]
    fn test_empty_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(read_csv(&path), Err(AppError::SourceReadError(_))));
    }
}
