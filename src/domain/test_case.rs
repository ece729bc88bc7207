use serde::{Deserialize, Serialize};

pub const COLUMN_ID: &str = "Id";
pub const COLUMN_DIRECTION: &str = "Direction";
pub const COLUMN_SECTION: &str = "Section";
pub const COLUMN_NAME: &str = "TestCaseName";
pub const COLUMN_PRECONDITIONS: &str = "Preconditions";
pub const COLUMN_STEPS: &str = "Steps";
pub const COLUMN_POSTCONDITIONS: &str = "Postconditions";
pub const COLUMN_EXPECTED_RESULT: &str = "ExpectedResult";

/// The eight workbook columns a test-case suite must carry, in sheet order.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    COLUMN_ID,
    COLUMN_DIRECTION,
    COLUMN_SECTION,
    COLUMN_NAME,
    COLUMN_PRECONDITIONS,
    COLUMN_STEPS,
    COLUMN_POSTCONDITIONS,
    COLUMN_EXPECTED_RESULT,
];

/// One spreadsheet row restricted to the required columns.
///
/// Blank cells are `None`. `row_number` is the 1-based sheet row (header is
/// row 1) and is only used for error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub row_number: usize,
    pub id: Option<String>,
    pub direction: Option<String>,
    pub section: Option<String>,
    pub name: Option<String>,
    pub preconditions: Option<String>,
    pub steps: Option<String>,
    pub postconditions: Option<String>,
    pub expected_result: Option<String>,
}

/// A normalized test case, one per distinct workbook id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub direction: String,
    pub section: String,
    pub name: String,
    pub steps: String,
    pub expected_result: String,
}

/// Treats empty and whitespace-only cells as blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
