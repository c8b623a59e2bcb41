//! Turns the raw diagnostics area of a load call into `Warning` values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Warning, WarningLevel};
use crate::error::{EtlError, EtlResult};

/// One row of the engine's diagnostics area, as retrieved after a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRow {
    /// Engine level string ("Warning", "Note", ...)
    pub level: String,

    pub code: u32,

    pub message: String,

    /// Row number when the engine recorded it separately from the message
    pub row: Option<u64>,
}

impl DiagnosticRow {
    pub fn new(level: WarningLevel, code: u32, message: impl Into<String>, row: u64) -> Self {
        Self {
            level: level.as_str().to_string(),
            code,
            message: message.into(),
            row: Some(row),
        }
    }
}

/// The diagnostics query failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct DiagnosticsError(pub String);

/// Raw diagnostics as returned by a load call.
pub type RawDiagnostics = Result<Vec<DiagnosticRow>, DiagnosticsError>;

/// Normalize the diagnostics of one load call against `table`.
///
/// Engine order is preserved and nothing is deduplicated. A failed
/// retrieval is an error, never an empty list.
pub fn collect(table: &str, raw: &RawDiagnostics) -> EtlResult<Vec<Warning>> {
    let rows = raw
        .as_ref()
        .map_err(|e| EtlError::DiagnosticsUnavailable(e.to_string()))?;

    Ok(rows
        .iter()
        .map(|row| Warning {
            code: row.code,
            message: row.message.clone(),
            severity: WarningLevel::from_engine(&row.level),
            source_table: table.to_string(),
            row_number: row.row.or_else(|| row_from_message(&row.message)),
        })
        .collect())
}

/// Recover a row number from messages like "... at row 3" or "Row 3 was
/// truncated ...".
fn row_from_message(message: &str) -> Option<u64> {
    let lower = message.to_ascii_lowercase();
    let tail = if let Some(idx) = lower.rfind(" at row ") {
        &message[idx + " at row ".len()..]
    } else if lower.starts_with("row ") {
        &message["row ".len()..]
    } else {
        return None;
    };

    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
