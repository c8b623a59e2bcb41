//! Delimited (tab- or comma-separated) file ingestion.
//!
//! Rules:
//!
//! - The first line names the columns.
//! - `\N` is NULL; every other field is passed on as a string.
//! - Short rows simply lack the trailing columns.
//! - Fields beyond the header are dropped and counted on the record.

use std::path::Path;

use serde_json::{Map, Value};

use super::Records;
use crate::domain::IngestRecord;
use crate::error::{EtlError, EtlResult};

/// Marker for a NULL field
pub const NULL_MARKER: &str = "\\N";

/// Reads one delimited file into records
#[derive(Debug, Clone, Copy)]
pub struct DelimitedFileIngestor {
    delimiter: u8,
}

impl Default for DelimitedFileIngestor {
    fn default() -> Self {
        Self { delimiter: b'\t' }
    }
}

impl DelimitedFileIngestor {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn ingest(&self, path: &Path) -> EtlResult<Records> {
        let file = std::fs::File::open(path).map_err(|e| EtlError::source_unavailable(path, e))?;
        let records = self.ingest_reader(path, file)?;

        tracing::debug!(path = %path.display(), records = records.len(), "Ingested delimited file");

        Ok(records)
    }

    /// Parse delimited data from any reader. `path` is only used for
    /// diagnostics.
    pub fn ingest_reader<R: std::io::Read>(&self, path: &Path, reader: R) -> EtlResult<Records> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| csv_error(path, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                return Err(EtlError::malformed(
                    path,
                    format!("header field {} is empty", idx + 1),
                ));
            }
            if headers[..idx].contains(header) {
                return Err(EtlError::malformed(
                    path,
                    format!("column '{}' appears twice in the header", header),
                ));
            }
        }

        let mut records = Vec::new();
        for result in rdr.records() {
            let row = result.map_err(|e| csv_error(path, e))?;

            let mut fields = Map::new();
            for (header, raw) in headers.iter().zip(row.iter()) {
                let value = if raw == NULL_MARKER {
                    Value::Null
                } else {
                    Value::String(raw.to_string())
                };
                fields.insert(header.clone(), value);
            }

            let surplus = row.len().saturating_sub(headers.len());
            records.push(IngestRecord::new(fields).with_surplus_fields(surplus));
        }

        Ok(Records::new(records))
    }
}

fn csv_error(path: &Path, err: csv::Error) -> EtlError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => EtlError::source_unavailable(path, io),
        other => EtlError::malformed(path, format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ingest(data: &str) -> EtlResult<Vec<IngestRecord>> {
        DelimitedFileIngestor::default()
            .ingest_reader(Path::new("test.tsv"), data.as_bytes())
            .map(|r| r.collect())
    }

    #[test]
    fn test_basic_rows() {
        let records = ingest("id\tname\n1\talice\n2\tbob\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("name"), Some(&json!("bob")));
        assert_eq!(records[0].get("id"), Some(&json!("1")));
    }

    #[test]
    fn test_null_marker() {
        let records = ingest("id\tname\n1\t\\N\n").unwrap();
        assert_eq!(records[0].get("name"), Some(&Value::Null));
    }

    #[test]
    fn test_short_and_long_rows() {
        let records = ingest("a\tb\tc\n1\n1\t2\t3\t4\t5\n").unwrap();
        assert_eq!(records[0].len(), 1);
        assert_eq!(records[0].surplus_fields(), 0);
        assert_eq!(records[1].len(), 3);
        assert_eq!(records[1].surplus_fields(), 2);
    }

    #[test]
    fn test_empty_file() {
        assert!(ingest("").unwrap().is_empty());
        assert!(ingest("a\tb\n").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_header() {
        assert!(matches!(
            ingest("a\ta\n1\t2\n"),
            Err(EtlError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_comma_delimiter() {
        let records = DelimitedFileIngestor::new(b',')
            .ingest_reader(Path::new("x.csv"), "a,b\n1,\"two, three\"\n".as_bytes())
            .unwrap()
            .collect::<Vec<_>>();
        assert_eq!(records[0].get("b"), Some(&json!("two, three")));
    }
}
