//! overseer - configuration-driven ETL loader
//!
//! Loads JSON and delimited files into SQLite tables. Field values that do
//! not fit their column are coerced and reported as warnings instead of
//! failing the load; a per-action policy decides which warnings reach the
//! operator.
//!
//! # Architecture
//!
//! - An **action** reads one source (a directory of JSON files, one JSON
//!   file, or one delimited file) and loads it into one table
//! - A **pipeline** runs actions in order and stops at the first failure
//! - The **overseer** resolves a name to either and writes the log stream
//!
//! # Modules
//!
//! - `ingest`: Directory scanning and file parsing
//! - `load`: The `Loader` seam and its SQLite implementation
//! - `warnings`: Diagnostics collection and suppression policy
//! - `core`: Action, Pipeline, Overseer
//! - `report`: The structured log stream and its text rendering
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run a pipeline
//! overseer run nightly
//!
//! # Hide one warning code for this run only
//! overseer run load_events -o hide_sql_warning_codes=1366
//!
//! # What does the config define?
//! overseer list
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod load;
pub mod report;
pub mod warnings;

// Re-export main types at crate root for convenience
pub use config::{EtlConfig, WarningOptions};
pub use core::{Action, ActionSpec, Overseer, PipelineSpec, SourceSpec};
pub use domain::{ActionResult, ActionState, IngestRecord, RunOutcome, Warning, WarningLevel};
pub use error::{EtlError, EtlResult};
pub use load::{LoadMode, LoadOutcome, Loader, SqliteStore};
pub use report::{LogRecord, LogSink, MemorySink, Severity, TextSink};
pub use warnings::WarningPolicy;
