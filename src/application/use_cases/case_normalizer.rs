//! Workbook normalization for QA test-case suites.
//!
//! Authors spread one case over several sheet rows: the identifying columns
//! are filled on the first row only, and free text is typed one row below
//! the row it belongs to. Normalization:
//! - forward-fills `Id`, `Direction`, `Section` and `TestCaseName`
//! - groups rows by id in first-seen order
//! - shifts every content column up by one row inside each group
//! - folds preconditions and postconditions into empty step cells
//! - emits one `TestCase` per group
//!
//! Everything here is a pure function of its input rows.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{RawRow, TestCase};

/// Content cells of one group row after bubble-up and step consolidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidatedRow {
    pub steps: Option<String>,
    pub expected_result: Option<String>,
}

#[derive(Debug, Clone)]
struct FilledRow<'a> {
    raw: &'a RawRow,
    id: Option<i64>,
    direction: Option<String>,
    section: Option<String>,
    name: Option<String>,
}

struct CaseGroup<'a> {
    id: i64,
    rows: Vec<FilledRow<'a>>,
}

pub fn normalize(rows: &[RawRow]) -> Result<Vec<TestCase>> {
    let filled = forward_fill(rows)?;
    let groups = group_by_id(filled);

    let mut cases = Vec::with_capacity(groups.len());
    for group in &groups {
        cases.push(build_case(group)?);
    }

    info!(
        rows = rows.len(),
        cases = cases.len(),
        "Normalized workbook rows into test cases"
    );
    Ok(cases)
}

/// Shifts a column up by one position; the last cell becomes blank.
pub fn bubble_up(column: &[Option<String>]) -> Vec<Option<String>> {
    if column.is_empty() {
        return Vec::new();
    }
    column
        .iter()
        .skip(1)
        .cloned()
        .chain(std::iter::once(None))
        .collect()
}

/// Row-wise `steps ?? preconditions ?? postconditions`.
pub fn consolidate_steps(
    steps: &[Option<String>],
    preconditions: &[Option<String>],
    postconditions: &[Option<String>],
) -> Vec<Option<String>> {
    steps
        .iter()
        .zip(preconditions)
        .zip(postconditions)
        .map(|((step, pre), post)| step.clone().or_else(|| pre.clone()).or_else(|| post.clone()))
        .collect()
}

/// Applies bubble-up to every content column of a group and consolidates
/// steps. Returns one entry per input row.
pub fn consolidate_group(rows: &[&RawRow]) -> Vec<ConsolidatedRow> {
    let preconditions = shifted(rows, |row| row.preconditions.clone());
    let steps = shifted(rows, |row| row.steps.clone());
    let postconditions = shifted(rows, |row| row.postconditions.clone());
    let expected = shifted(rows, |row| row.expected_result.clone());

    consolidate_steps(&steps, &preconditions, &postconditions)
        .into_iter()
        .zip(expected)
        .map(|(steps, expected_result)| ConsolidatedRow {
            steps,
            expected_result,
        })
        .collect()
}

fn shifted(rows: &[&RawRow], pick: impl Fn(&RawRow) -> Option<String>) -> Vec<Option<String>> {
    let column: Vec<Option<String>> = rows.iter().map(|row| pick(row)).collect();
    bubble_up(&column)
}

/// Ids are parsed here so that `1`, `1.0` and `01` all fill and group as
/// the same case.
fn forward_fill(rows: &[RawRow]) -> Result<Vec<FilledRow<'_>>> {
    let mut last_id = None;
    let mut last_direction = None;
    let mut last_section = None;
    let mut last_name = None;

    let mut filled = Vec::with_capacity(rows.len());
    for raw in rows {
        if let Some(text) = &raw.id {
            last_id = Some(parse_case_id(text, raw.row_number)?);
        }
        fill(&mut last_direction, &raw.direction);
        fill(&mut last_section, &raw.section);
        fill(&mut last_name, &raw.name);
        filled.push(FilledRow {
            raw,
            id: last_id,
            direction: last_direction.clone(),
            section: last_section.clone(),
            name: last_name.clone(),
        });
    }
    Ok(filled)
}

fn fill(last: &mut Option<String>, current: &Option<String>) {
    if current.is_some() {
        *last = current.clone();
    }
}

fn group_by_id(rows: Vec<FilledRow<'_>>) -> Vec<CaseGroup<'_>> {
    let mut groups: Vec<CaseGroup<'_>> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let Some(id) = row.id else {
            warn!(
                row = row.raw.row_number,
                "Skipping row before the first test case id"
            );
            continue;
        };

        match positions.get(&id) {
            Some(&position) => groups[position].rows.push(row),
            None => {
                positions.insert(id, groups.len());
                groups.push(CaseGroup { id, rows: vec![row] });
            }
        }
    }

    debug!(groups = groups.len(), "Split rows by test case id");
    groups
}

fn build_case(group: &CaseGroup<'_>) -> Result<TestCase> {
    let first = &group.rows[0];
    let row_number = first.raw.row_number;
    let id = group.id;

    let raw_rows: Vec<&RawRow> = group.rows.iter().map(|row| row.raw).collect();
    let consolidated = consolidate_group(&raw_rows);

    let steps = consolidated
        .iter()
        .filter_map(|row| row.steps.as_deref())
        .collect::<Vec<_>>()
        .join(" ");
    let expected_result = consolidated
        .iter()
        .find_map(|row| row.expected_result.clone())
        .unwrap_or_default();

    Ok(TestCase {
        id,
        direction: required(&first.direction, "Direction", id, row_number)?,
        section: required(&first.section, "Section", id, row_number)?,
        name: required(&first.name, "TestCaseName", id, row_number)?,
        steps,
        expected_result,
    })
}

fn required(value: &Option<String>, column: &str, id: i64, row_number: usize) -> Result<String> {
    value.clone().ok_or_else(|| {
        AppError::SchemaError(format!(
            "Test case {} (row {}) has no {} value",
            id, row_number, column
        ))
    })
}

/// Accepts integral ids, including spreadsheet floats such as `12.0`.
pub fn parse_case_id(text: &str, row_number: usize) -> Result<i64> {
    let trimmed = text.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return Ok(id);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => Ok(value as i64),
        _ => Err(AppError::SchemaError(format!(
            "Row {}: test case id '{}' is not an integer",
            row_number, trimmed
        ))),
    }
}
