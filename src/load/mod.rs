//! Loading records into the relational store.
//!
//! Two paths share one set of coercion rules:
//! - `bulk_load`: set-oriented, one transaction per call; a hard failure
//!   anywhere rejects the whole call
//! - `insert_one`: row-oriented, one commit per row; a refused row is
//!   reported and the caller carries on
//!
//! Both leave their diagnostics in the engine's diagnostics area and
//! return them with the outcome for the warning collector.

pub mod codes;
pub mod coerce;
pub mod schema;
pub mod sqlite;

use serde::{Deserialize, Serialize};

use crate::domain::{IngestRecord, RowRejection};
use crate::error::EtlResult;
use crate::warnings::RawDiagnostics;

pub use schema::{Column, ColumnType, TableSchema};
pub use sqlite::SqliteStore;

/// Which loader path an action uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// One set-oriented load per source file
    Bulk,

    /// One insert per record
    Row,
}

impl Default for LoadMode {
    fn default() -> Self {
        Self::Bulk
    }
}

/// Result of one loader call
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Rows committed by this call
    pub records_loaded: u64,

    /// The diagnostics area after the call, or why it could not be read
    pub raw_warnings: RawDiagnostics,

    /// Set when the row-oriented path refused the row
    pub rejected: Option<RowRejection>,
}

/// Set- and row-oriented insertion into a target table
pub trait Loader {
    /// Load every record in one set-oriented call
    fn bulk_load(
        &mut self,
        table: &str,
        records: &mut dyn Iterator<Item = IngestRecord>,
    ) -> EtlResult<LoadOutcome>;

    /// Insert a single record
    fn insert_one(&mut self, table: &str, record: IngestRecord) -> EtlResult<LoadOutcome>;
}
