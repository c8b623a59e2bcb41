//! JSON array ingestion.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - An empty array: `[]`
//! - A zero-byte (or whitespace-only) file
//!
//! Anything else fails the whole file; no records are yielded from a file
//! that does not parse.

use std::path::Path;

use serde_json::Value;

use super::Records;
use crate::domain::{FileDescriptor, IngestRecord};
use crate::error::{EtlError, EtlResult};

/// Reads one JSON file into records.
///
/// Holds no state between calls: ingesting the same file twice yields the
/// same records twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredFileIngestor;

impl StructuredFileIngestor {
    pub fn new() -> Self {
        Self
    }

    /// Ingest a file found by a scan
    pub fn ingest(&self, file: &FileDescriptor) -> EtlResult<Records> {
        self.ingest_path(&file.path)
    }

    /// Ingest a file by path
    pub fn ingest_path(&self, path: &Path) -> EtlResult<Records> {
        let bytes = std::fs::read(path).map_err(|e| EtlError::source_unavailable(path, e))?;
        let records = parse_records(path, &bytes)?;

        tracing::debug!(path = %path.display(), records = records.len(), "Ingested JSON file");

        Ok(records)
    }
}

/// Parse file content into records. `path` is only used for diagnostics.
pub fn parse_records(path: &Path, bytes: &[u8]) -> EtlResult<Records> {
    let content = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Records::empty());
    }

    let value: Value = serde_json::from_slice(content)
        .map_err(|e| EtlError::malformed(path, format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(EtlError::malformed(
                path,
                format!("expected a JSON array of objects, found {}", kind(&other)),
            ))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(fields) => records.push(IngestRecord::new(fields)),
            other => {
                return Err(EtlError::malformed(
                    path,
                    format!("element {} is {}, expected an object", idx + 1, kind(&other)),
                ))
            }
        }
    }

    Ok(Records::new(records))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
