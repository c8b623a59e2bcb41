//! Records and file descriptors flowing from ingestors to loaders.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{EtlError, EtlResult};

/// One record handed from an ingestor to a loader.
///
/// Field order is the order the source presented the fields in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestRecord {
    fields: Map<String, Value>,

    /// Fields the source carried beyond its named columns (delimited
    /// sources only)
    surplus_fields: usize,
}

impl IngestRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            surplus_fields: 0,
        }
    }

    pub fn with_surplus_fields(mut self, count: usize) -> Self {
        self.surplus_fields = count;
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn surplus_fields(&self) -> usize {
        self.surplus_fields
    }
}

impl From<Map<String, Value>> for IngestRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// A candidate input file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Path to the file
    pub path: PathBuf,

    /// Size at discovery time
    pub size_bytes: u64,

    /// Position in the scan that produced it
    pub discovered_at: usize,
}

impl FileDescriptor {
    /// Describe a single file outside of any directory scan.
    pub fn from_path(path: &Path) -> EtlResult<Self> {
        let metadata =
            std::fs::metadata(path).map_err(|e| EtlError::source_unavailable(path, e))?;

        if !metadata.is_file() {
            return Err(EtlError::source_unavailable(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            discovered_at: 0,
        })
    }
}
