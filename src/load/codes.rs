//! Diagnostic codes and their engine messages.
//!
//! Codes and wording follow the MySQL diagnostics area so existing
//! suppression lists keep working.

/// Row lacked data for some columns (bulk path)
pub const ROW_MISSING_COLUMNS: u32 = 1261;

/// Row carried more fields than the source named
pub const ROW_SURPLUS_FIELDS: u32 = 1262;

/// NULL replaced by a column default (bulk path)
pub const NULL_TO_DEFAULT: u32 = 1263;

/// Value clamped to the column's range
pub const OUT_OF_RANGE: u32 = 1264;

/// Value truncated or rounded to fit the column
pub const DATA_TRUNCATED: u32 = 1265;

/// Missing NOT NULL column with no default
pub const NO_DEFAULT: u32 = 1364;

/// Value not usable as an integer; stored as 0
pub const INCORRECT_INTEGER: u32 = 1366;

/// NULL into a NOT NULL column
pub const COLUMN_NOT_NULL: u32 = 1048;

/// Record names a column the table does not have
pub const UNKNOWN_COLUMN: u32 = 1054;

/// Duplicate key
pub const DUPLICATE_ENTRY: u32 = 1062;

/// Target table missing
pub const NO_SUCH_TABLE: u32 = 1146;

/// Foreign key failure
pub const FOREIGN_KEY: u32 = 1452;

/// CHECK constraint failure
pub const CHECK_VIOLATED: u32 = 3819;

/// Anything the engine did not classify
pub const UNKNOWN_ERROR: u32 = 1105;

pub fn out_of_range(column: &str, row: u64) -> String {
    format!("Out of range value for column '{}' at row {}", column, row)
}

pub fn data_truncated(column: &str, row: u64) -> String {
    format!("Data truncated for column '{}' at row {}", column, row)
}

pub fn incorrect_integer(value: &str, column: &str, row: u64) -> String {
    format!(
        "Incorrect integer value: '{}' for column '{}' at row {}",
        value, column, row
    )
}

pub fn row_missing_columns(row: u64) -> String {
    format!("Row {} doesn't contain data for all columns", row)
}

pub fn row_surplus_fields(row: u64) -> String {
    format!(
        "Row {} was truncated; it contained more data than there were input columns",
        row
    )
}

pub fn null_to_default(column: &str, row: u64) -> String {
    format!(
        "Column set to default value; NULL supplied to NOT NULL column '{}' at row {}",
        column, row
    )
}

pub fn no_default(column: &str) -> String {
    format!("Field '{}' doesn't have a default value", column)
}

pub fn column_not_null(column: &str) -> String {
    format!("Column '{}' cannot be null", column)
}

pub fn unknown_column(column: &str) -> String {
    format!("Unknown column '{}' in 'field list'", column)
}

pub fn no_such_table(table: &str) -> String {
    format!("Table '{}' doesn't exist", table)
}
