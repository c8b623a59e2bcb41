//! Lenient value coercion.
//!
//! Values that do not fit their column are coerced (clamped, truncated,
//! defaulted) and leave a diagnostics row behind. Only conditions the
//! engine cannot paper over produce a `RowPlan::Reject`.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::codes;
use super::schema::{Column, ColumnType, TableSchema};
use super::LoadMode;
use crate::domain::{IngestRecord, WarningLevel};
use crate::warnings::DiagnosticRow;

/// Largest finite single-precision value
const FLOAT_MAX: f64 = 3.402_823_466e38;

/// What to do with one record
#[derive(Debug, Clone, PartialEq)]
pub enum RowPlan {
    /// Insert these columns (omitted columns take their defaults)
    Insert {
        columns: Vec<String>,
        values: Vec<SqlValue>,
    },

    /// The engine refuses the row
    Reject { code: u32, message: String },
}

/// Map a record onto `schema`, coercing every value.
///
/// `row` is the 1-based position used in diagnostics. Diagnostics are
/// appended to `diagnostics` even if the row is rejected later on; callers
/// discard them in that case.
pub fn plan_row(
    schema: &TableSchema,
    record: &IngestRecord,
    row: u64,
    mode: LoadMode,
    diagnostics: &mut Vec<DiagnosticRow>,
) -> RowPlan {
    if let Some(unknown) = record
        .fields()
        .keys()
        .find(|key| schema.column(key).is_none())
    {
        return RowPlan::Reject {
            code: codes::UNKNOWN_COLUMN,
            message: codes::unknown_column(unknown),
        };
    }

    if record.surplus_fields() > 0 {
        diagnostics.push(DiagnosticRow::new(
            WarningLevel::Warning,
            codes::ROW_SURPLUS_FIELDS,
            codes::row_surplus_fields(row),
            row,
        ));
    }

    let lacks_columns = schema
        .columns
        .iter()
        .any(|c| !c.auto_increment && find_value(record, &c.name).is_none());
    if mode == LoadMode::Bulk && lacks_columns {
        diagnostics.push(DiagnosticRow::new(
            WarningLevel::Warning,
            codes::ROW_MISSING_COLUMNS,
            codes::row_missing_columns(row),
            row,
        ));
    }

    let mut columns = Vec::with_capacity(schema.columns.len());
    let mut values = Vec::with_capacity(schema.columns.len());

    for column in &schema.columns {
        match find_value(record, &column.name) {
            Some(Value::Null) if column.not_null => match mode {
                LoadMode::Bulk if column.has_default => {
                    diagnostics.push(DiagnosticRow::new(
                        WarningLevel::Warning,
                        codes::NULL_TO_DEFAULT,
                        codes::null_to_default(&column.name, row),
                        row,
                    ));
                }
                _ => {
                    return RowPlan::Reject {
                        code: codes::COLUMN_NOT_NULL,
                        message: codes::column_not_null(&column.name),
                    }
                }
            },
            Some(Value::Null) => {
                columns.push(column.name.clone());
                values.push(SqlValue::Null);
            }
            Some(value) => {
                columns.push(column.name.clone());
                values.push(coerce(column, value, row, diagnostics));
            }
            None if column.fills_itself() => {}
            None => match (mode, implicit_default(column)) {
                (LoadMode::Row, Some(default)) => {
                    diagnostics.push(DiagnosticRow::new(
                        WarningLevel::Warning,
                        codes::NO_DEFAULT,
                        codes::no_default(&column.name),
                        row,
                    ));
                    columns.push(column.name.clone());
                    values.push(default);
                }
                (LoadMode::Bulk, _) => {
                    return RowPlan::Reject {
                        code: codes::COLUMN_NOT_NULL,
                        message: codes::column_not_null(&column.name),
                    }
                }
                (LoadMode::Row, None) => {
                    return RowPlan::Reject {
                        code: codes::NO_DEFAULT,
                        message: codes::no_default(&column.name),
                    }
                }
            },
        }
    }

    RowPlan::Insert { columns, values }
}

/// Record value for a column, matching names case-insensitively
fn find_value<'a>(record: &'a IngestRecord, column: &str) -> Option<&'a Value> {
    record.get(column).or_else(|| {
        record
            .fields()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// Type default used when a NOT NULL column without a default is omitted
fn implicit_default(column: &Column) -> Option<SqlValue> {
    match column.ty {
        ColumnType::Integer { .. } => Some(SqlValue::Integer(0)),
        ColumnType::Real { .. } => Some(SqlValue::Real(0.0)),
        ColumnType::Text { .. } => Some(SqlValue::Text(String::new())),
        ColumnType::Other => None,
    }
}

/// Coerce a non-null value into `column`'s type
pub fn coerce(
    column: &Column,
    value: &Value,
    row: u64,
    diagnostics: &mut Vec<DiagnosticRow>,
) -> SqlValue {
    let mut note = |level: WarningLevel, code: u32, message: String| {
        diagnostics.push(DiagnosticRow::new(level, code, message, row));
    };

    match column.ty {
        ColumnType::Integer { min, max } => {
            let number = match value {
                Value::Bool(b) => Number::Int(i128::from(*b)),
                Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                    (Some(i), _) => Number::Int(i128::from(i)),
                    (None, Some(u)) => Number::Int(i128::from(u)),
                    _ => {
                        let f = n.as_f64().unwrap_or(0.0);
                        if f.fract() != 0.0 {
                            note(
                                WarningLevel::Note,
                                codes::DATA_TRUNCATED,
                                codes::data_truncated(&column.name, row),
                            );
                        }
                        Number::Float(f)
                    }
                },
                other => {
                    let text = as_text(other);
                    match numeric_prefix(&text) {
                        None => {
                            note(
                                WarningLevel::Warning,
                                codes::INCORRECT_INTEGER,
                                codes::incorrect_integer(&text, &column.name, row),
                            );
                            return SqlValue::Integer(0);
                        }
                        Some((prefix, complete)) => {
                            let number = Number::parse(prefix);
                            if !complete {
                                note(
                                    WarningLevel::Warning,
                                    codes::DATA_TRUNCATED,
                                    codes::data_truncated(&column.name, row),
                                );
                            } else if number.has_fraction() {
                                note(
                                    WarningLevel::Note,
                                    codes::DATA_TRUNCATED,
                                    codes::data_truncated(&column.name, row),
                                );
                            }
                            number
                        }
                    }
                }
            };

            let (clamped, out_of_range) = number.clamp(min, max);
            if out_of_range {
                note(
                    WarningLevel::Warning,
                    codes::OUT_OF_RANGE,
                    codes::out_of_range(&column.name, row),
                );
            }
            SqlValue::Integer(clamped)
        }

        ColumnType::Real { single_precision } => {
            let mut number = match value {
                Value::Bool(b) => f64::from(u8::from(*b)),
                Value::Number(n) => n.as_f64().unwrap_or(0.0),
                other => {
                    let text = as_text(other);
                    match numeric_prefix(&text) {
                        Some((prefix, true)) => prefix.parse().unwrap_or(0.0),
                        partial => {
                            note(
                                WarningLevel::Warning,
                                codes::DATA_TRUNCATED,
                                codes::data_truncated(&column.name, row),
                            );
                            partial
                                .and_then(|(prefix, _)| prefix.parse().ok())
                                .unwrap_or(0.0)
                        }
                    }
                }
            };

            let limit = if single_precision { FLOAT_MAX } else { f64::MAX };
            if !number.is_finite() || number.abs() > limit {
                note(
                    WarningLevel::Warning,
                    codes::OUT_OF_RANGE,
                    codes::out_of_range(&column.name, row),
                );
                number = if number.is_sign_negative() { -limit } else { limit };
            }
            SqlValue::Real(number)
        }

        ColumnType::Text { max_chars } => {
            let text = as_text(value);
            match max_chars {
                Some(max) if text.chars().count() > max => {
                    note(
                        WarningLevel::Warning,
                        codes::DATA_TRUNCATED,
                        codes::data_truncated(&column.name, row),
                    );
                    SqlValue::Text(text.chars().take(max).collect())
                }
                _ => SqlValue::Text(text),
            }
        }

        ColumnType::Other => match value {
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
            },
            other => SqlValue::Text(as_text(other)),
        },
    }
}

/// String form of a JSON value as the engine would receive it
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Longest leading numeric literal of `text` (after leading whitespace),
/// and whether it covers the whole (trimmed) string.
fn numeric_prefix(text: &str) -> Option<(&str, bool)> {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if digits > 0 || frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    Some((&trimmed[..end], end == trimmed.len()))
}

/// Intermediate numeric form before range clamping
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn parse(literal: &str) -> Self {
        literal
            .parse::<i128>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Float(literal.parse().unwrap_or(0.0)))
    }

    fn has_fraction(&self) -> bool {
        matches!(self, Self::Float(f) if f.fract() != 0.0)
    }

    /// Round, then clamp into `[min, max]`. Returns whether it was clamped.
    fn clamp(self, min: i64, max: i64) -> (i64, bool) {
        match self {
            Self::Int(i) if i < i128::from(min) => (min, true),
            Self::Int(i) if i > i128::from(max) => (max, true),
            Self::Int(i) => (i as i64, false),
            Self::Float(f) => {
                let rounded = f.round();
                if rounded.is_nan() {
                    (0, true)
                } else if rounded < min as f64 {
                    (min, true)
                } else if rounded > max as f64 {
                    (max, true)
                } else {
                    (rounded as i64, false)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn column(name: &str, declared: &str, not_null: bool, has_default: bool) -> Column {
        Column {
            name: name.to_string(),
            declared: declared.to_string(),
            ty: ColumnType::from_declared(declared),
            not_null,
            has_default,
            auto_increment: false,
        }
    }

    fn record(value: serde_json::Value) -> IngestRecord {
        match value {
            serde_json::Value::Object(map) => IngestRecord::new(map),
            _ => IngestRecord::new(Map::new()),
        }
    }

    fn coerce_one(declared: &str, value: serde_json::Value) -> (SqlValue, Vec<DiagnosticRow>) {
        let mut diags = Vec::new();
        let out = coerce(&column("c", declared, false, false), &value, 1, &mut diags);
        (out, diags)
    }

    #[test]
    fn test_integer_out_of_range_is_clamped() {
        let (value, diags) = coerce_one("TINYINT", json!(300));
        assert_eq!(value, SqlValue::Integer(127));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::OUT_OF_RANGE);

        let (value, _) = coerce_one("TINYINT UNSIGNED", json!(-5));
        assert_eq!(value, SqlValue::Integer(0));
    }

    #[test]
    fn test_empty_string_into_integer() {
        let (value, diags) = coerce_one("INT", json!(""));
        assert_eq!(value, SqlValue::Integer(0));
        assert_eq!(diags[0].code, codes::INCORRECT_INTEGER);
        assert_eq!(
            diags[0].message,
            "Incorrect integer value: '' for column 'c' at row 1"
        );
    }

    #[test]
    fn test_numeric_prefix_into_integer() {
        let (value, diags) = coerce_one("INT", json!("42abc"));
        assert_eq!(value, SqlValue::Integer(42));
        assert_eq!(diags[0].code, codes::DATA_TRUNCATED);
        assert_eq!(diags[0].level, "Warning");
    }

    #[test]
    fn test_fraction_rounds_with_note() {
        let (value, diags) = coerce_one("INT", json!(2.5));
        assert_eq!(value, SqlValue::Integer(3));
        assert_eq!(diags[0].level, "Note");

        let (value, diags) = coerce_one("INT", json!("7"));
        assert_eq!(value, SqlValue::Integer(7));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_string_truncation() {
        let (value, diags) = coerce_one("VARCHAR(5)", json!("abcdefgh"));
        assert_eq!(value, SqlValue::Text("abcde".to_string()));
        assert_eq!(diags[0].code, codes::DATA_TRUNCATED);

        let (value, diags) = coerce_one("VARCHAR(5)", json!(12));
        assert_eq!(value, SqlValue::Text("12".to_string()));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_real_columns() {
        let (value, diags) = coerce_one("FLOAT", json!(1e39));
        assert_eq!(value, SqlValue::Real(FLOAT_MAX));
        assert_eq!(diags[0].code, codes::OUT_OF_RANGE);

        let (value, diags) = coerce_one("DOUBLE", json!("n/a"));
        assert_eq!(value, SqlValue::Real(0.0));
        assert_eq!(diags[0].code, codes::DATA_TRUNCATED);

        let (value, diags) = coerce_one("DOUBLE", json!(" 1.5e2 "));
        assert_eq!(value, SqlValue::Real(150.0));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_other_types_pass_through() {
        let (value, diags) = coerce_one("DATETIME", json!("2024-01-01 00:00:00"));
        assert_eq!(value, SqlValue::Text("2024-01-01 00:00:00".to_string()));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_numeric_prefix() {
        assert_eq!(numeric_prefix("12"), Some(("12", true)));
        assert_eq!(numeric_prefix(" -3.5x"), Some(("-3.5", false)));
        assert_eq!(numeric_prefix(".5"), Some((".5", true)));
        assert_eq!(numeric_prefix("1e3"), Some(("1e3", true)));
        assert_eq!(numeric_prefix("1e"), Some(("1", false)));
        assert_eq!(numeric_prefix("abc"), None);
        assert_eq!(numeric_prefix(""), None);
        assert_eq!(numeric_prefix("-"), None);
    }

    fn schema() -> TableSchema {
        TableSchema {
            name: "t".to_string(),
            columns: vec![
                Column {
                    auto_increment: true,
                    ..column("id", "INTEGER", false, false)
                },
                column("qty", "TINYINT", true, false),
                column("label", "VARCHAR(4)", false, false),
                column("status", "VARCHAR(8)", true, true),
            ],
        }
    }

    #[test]
    fn test_plan_two_coercions() {
        let mut diags = Vec::new();
        let plan = plan_row(
            &schema(),
            &record(json!({"qty": 1000, "label": "overflow", "status": "ok"})),
            1,
            LoadMode::Bulk,
            &mut diags,
        );

        assert!(matches!(plan, RowPlan::Insert { .. }));
        let codes: Vec<_> = diags.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![codes::OUT_OF_RANGE, codes::DATA_TRUNCATED]);
    }

    #[test]
    fn test_plan_unknown_column() {
        let mut diags = Vec::new();
        let plan = plan_row(
            &schema(),
            &record(json!({"qty": 1, "bogus": 2})),
            1,
            LoadMode::Bulk,
            &mut diags,
        );
        assert!(matches!(plan, RowPlan::Reject { code: codes::UNKNOWN_COLUMN, .. }));
    }

    #[test]
    fn test_plan_null_handling_by_mode() {
        let row = record(json!({"qty": null, "label": "a", "status": "x"}));

        let mut diags = Vec::new();
        let bulk = plan_row(&schema(), &row, 1, LoadMode::Bulk, &mut diags);
        assert!(matches!(bulk, RowPlan::Reject { code: codes::COLUMN_NOT_NULL, .. }));

        let with_default = record(json!({"qty": 1, "label": "a", "status": null}));
        let mut diags = Vec::new();
        let plan = plan_row(&schema(), &with_default, 1, LoadMode::Bulk, &mut diags);
        match plan {
            RowPlan::Insert { columns, .. } => assert!(!columns.contains(&"status".to_string())),
            other => panic!("unexpected plan: {other:?}"),
        }
        assert_eq!(diags[0].code, codes::NULL_TO_DEFAULT);

        let mut diags = Vec::new();
        let plan = plan_row(&schema(), &with_default, 1, LoadMode::Row, &mut diags);
        assert!(matches!(plan, RowPlan::Reject { code: codes::COLUMN_NOT_NULL, .. }));
    }

    #[test]
    fn test_plan_missing_columns_by_mode() {
        let row = record(json!({"label": "a"}));

        let mut diags = Vec::new();
        let bulk = plan_row(&schema(), &row, 2, LoadMode::Bulk, &mut diags);
        match bulk {
            RowPlan::Reject { code, message } => {
                assert_eq!(code, codes::COLUMN_NOT_NULL);
                assert_eq!(message, "Column 'qty' cannot be null");
            }
            other => panic!("unexpected plan: {other:?}"),
        }
        assert_eq!(diags[0].code, codes::ROW_MISSING_COLUMNS);

        let mut diags = Vec::new();
        let plan = plan_row(&schema(), &row, 1, LoadMode::Row, &mut diags);
        match plan {
            RowPlan::Insert { columns, values } => {
                assert_eq!(columns, vec!["qty".to_string(), "label".to_string()]);
                assert_eq!(values[0], SqlValue::Integer(0));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
        assert_eq!(diags[0].code, codes::NO_DEFAULT);
    }

    #[test]
    fn test_plan_surplus_fields() {
        let row = record(json!({"qty": "1", "label": "a", "status": "s"})).with_surplus_fields(2);
        let mut diags = Vec::new();
        plan_row(&schema(), &row, 3, LoadMode::Bulk, &mut diags);
        assert_eq!(diags[0].code, codes::ROW_SURPLUS_FIELDS);
        assert_eq!(diags[0].row, Some(3));
    }
}
