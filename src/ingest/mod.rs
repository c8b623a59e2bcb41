//! Source discovery and structured-file ingestion.
//!
//! The pipeline for a directory source:
//!
//! 1. **Scanner**: lists matching files in a stable order
//! 2. **Json**: parses one file into records, all-or-nothing
//! 3. (delimited sources skip the scanner and read one tabular file)
//!
//! Nothing in here remembers what it has seen. Every call starts from
//! the filesystem as it is now.

pub mod delimited;
pub mod json;
pub mod scanner;

pub use delimited::DelimitedFileIngestor;
pub use json::StructuredFileIngestor;
pub use scanner::{DirectoryScanner, MatchCriteria, Scan};

use crate::domain::IngestRecord;

/// Records parsed from one source, yielded once in source order.
#[derive(Debug)]
pub struct Records {
    inner: std::vec::IntoIter<IngestRecord>,
}

impl Records {
    pub fn new(records: Vec<IngestRecord>) -> Self {
        Self {
            inner: records.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for Records {
    type Item = IngestRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Records {}
