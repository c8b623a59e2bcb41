//! Action definitions and execution.
//!
//! An action reads one source, streams its records into the loader and
//! reports the warnings its policy lets through. It moves through
//! `Pending -> Running -> {Succeeded, Failed}` exactly once.

use std::sync::atomic::Ordering;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::CancelFlag;
use crate::config::{EtlConfig, WarningOptions};
use crate::domain::{ActionResult, ActionState, RowRejection, Warning};
use crate::error::{EtlError, EtlResult};
use crate::ingest::scanner::DEFAULT_PATTERN;
use crate::ingest::{
    DelimitedFileIngestor, DirectoryScanner, MatchCriteria, Records, StructuredFileIngestor,
};
use crate::load::{LoadMode, LoadOutcome, Loader};
use crate::warnings::{collect, WarningPolicy};

/// A configured action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Where records come from
    pub source: SourceSpec,

    /// Target table
    pub target: String,

    /// Bulk (one engine call per file) or row-by-row
    #[serde(default)]
    pub mode: LoadMode,

    /// Warning visibility for this action
    #[serde(default)]
    pub options: WarningOptions,
}

/// Source of an action's records
///
/// ```yaml
/// source: { type: json_dir, directory: ${CLOUD_EVENT_LOG_DIR}, pattern: "*.json" }
/// source: { type: json_file, path: data/users.json }
/// source: { type: delimited_file, path: data/users.tsv, delimiter: "," }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    /// Every matching JSON file in a directory
    JsonDir {
        directory: String,
        #[serde(default = "default_pattern")]
        pattern: String,
    },

    /// One JSON file
    JsonFile { path: String },

    /// One delimited text file with a header line
    DelimitedFile {
        path: String,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

fn default_delimiter() -> char {
    '\t'
}

impl SourceSpec {
    /// Static checks; locators are expanded only when the action runs.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::JsonDir { directory, pattern } => {
                if directory.trim().is_empty() {
                    anyhow::bail!("Directory cannot be empty");
                }
                if let Err(e) = MatchCriteria::new(pattern) {
                    anyhow::bail!("Invalid file pattern '{}': {}", pattern, e);
                }
            }
            Self::JsonFile { path } => {
                if path.trim().is_empty() {
                    anyhow::bail!("Path cannot be empty");
                }
            }
            Self::DelimitedFile { path, delimiter } => {
                if path.trim().is_empty() {
                    anyhow::bail!("Path cannot be empty");
                }
                if !delimiter.is_ascii() {
                    anyhow::bail!("Delimiter '{}' must be a single ASCII character", delimiter);
                }
            }
        }
        Ok(())
    }

    /// The raw locator as configured
    pub fn locator(&self) -> &str {
        match self {
            Self::JsonDir { directory, .. } => directory,
            Self::JsonFile { path } | Self::DelimitedFile { path, .. } => path,
        }
    }
}

/// Running totals, kept even when the action fails
#[derive(Debug, Default)]
struct Progress {
    records_loaded: u64,
    warnings: Vec<Warning>,
    suppressed: usize,
    rejected: Vec<RowRejection>,
    files: usize,
}

/// One execution of a configured action
pub struct Action<'a> {
    name: &'a str,
    spec: &'a ActionSpec,
    policy: WarningPolicy,
    cancel: CancelFlag,
    state: ActionState,
    progress: Progress,
}

impl<'a> Action<'a> {
    /// Prepare an execution; invocation options are folded into the
    /// action's own policy here, once.
    pub fn new(
        name: &'a str,
        spec: &'a ActionSpec,
        invocation: &WarningOptions,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            name,
            spec,
            policy: WarningPolicy::resolve(&spec.options, invocation),
            cancel,
            state: ActionState::Pending,
            progress: Progress::default(),
        }
    }

    pub fn state(&self) -> &ActionState {
        &self.state
    }

    /// Run to a terminal state. The result is always produced; a fatal
    /// error is recorded in it together with whatever was committed
    /// before, and handed back alongside.
    #[instrument(skip_all, fields(action = %self.name, target = %self.spec.target))]
    pub fn run(
        mut self,
        config: &EtlConfig,
        loader: &mut dyn Loader,
    ) -> (ActionResult, Option<EtlError>) {
        let started_at = Utc::now();
        self.state = ActionState::Running;
        info!("Running action");

        let (state, exit_status, error) = match self.execute(config, loader) {
            Ok(()) => (ActionState::Succeeded, 0, None),
            Err(err) => (
                ActionState::Failed {
                    error: err.to_string(),
                },
                err.exit_code(),
                Some(err),
            ),
        };

        info!(
            records_loaded = self.progress.records_loaded,
            surfaced = self.progress.warnings.len(),
            suppressed = self.progress.suppressed,
            state = ?state,
            "Action finished"
        );

        let result = ActionResult {
            name: self.name.to_string(),
            target: self.spec.target.clone(),
            records_loaded: self.progress.records_loaded,
            warnings: self.progress.warnings,
            suppressed_warnings: self.progress.suppressed,
            rejected_rows: self.progress.rejected,
            files_processed: self.progress.files,
            state,
            exit_status,
            started_at,
            completed_at: Utc::now(),
        };

        (result, error)
    }

    fn execute(&mut self, config: &EtlConfig, loader: &mut dyn Loader) -> EtlResult<()> {
        self.check_cancelled()?;
        let spec = self.spec;

        let locator = config
            .resolve_locator(spec.source.locator())
            .map_err(|e| EtlError::Config(format!("action '{}': {}", self.name, e)))?;

        match &spec.source {
            SourceSpec::JsonDir { pattern, .. } => {
                let criteria = MatchCriteria::new(pattern).map_err(|e| {
                    EtlError::Config(format!("action '{}': bad pattern: {}", self.name, e))
                })?;
                let ingestor = StructuredFileIngestor::new();

                for file in DirectoryScanner::new(criteria).scan(&locator)? {
                    let file = file?;
                    self.check_cancelled()?;
                    debug!(path = %file.path.display(), bytes = file.size_bytes, "Ingesting file");

                    let records = ingestor.ingest(&file)?;
                    self.load(loader, records)?;
                    self.progress.files += 1;
                }
            }
            SourceSpec::JsonFile { .. } => {
                let records = StructuredFileIngestor::new().ingest_path(&locator)?;
                self.load(loader, records)?;
                self.progress.files += 1;
            }
            SourceSpec::DelimitedFile { delimiter, .. } => {
                let records = delimited_ingestor(*delimiter)?.ingest(&locator)?;
                self.load(loader, records)?;
                self.progress.files += 1;
            }
        }

        Ok(())
    }

    /// Feed one source's records to the loader
    fn load(&mut self, loader: &mut dyn Loader, mut records: Records) -> EtlResult<()> {
        let spec = self.spec;
        let table = spec.target.as_str();

        match spec.mode {
            LoadMode::Bulk => {
                let outcome = loader.bulk_load(table, &mut records)?;
                self.absorb(table, outcome, None)?;
            }
            LoadMode::Row => {
                for (idx, record) in records.enumerate() {
                    self.check_cancelled()?;
                    let outcome = loader.insert_one(table, record)?;
                    self.absorb(table, outcome, Some(idx as u64 + 1))?;
                }
            }
        }

        Ok(())
    }

    /// Fold one loader call into the running totals. A single-row call
    /// reports row 1; `position` puts the record's place in its source back.
    fn absorb(
        &mut self,
        table: &str,
        mut outcome: LoadOutcome,
        position: Option<u64>,
    ) -> EtlResult<()> {
        self.progress.records_loaded += outcome.records_loaded;

        let mut collected = collect(table, &outcome.raw_warnings)?;
        if let Some(row) = position {
            for warning in &mut collected {
                warning.row_number = Some(row);
            }
            if let Some(rejection) = outcome.rejected.as_mut() {
                rejection.row = row;
            }
        }
        let surfaced = self.policy.apply(&collected);
        self.progress.suppressed += collected.len() - surfaced.len();
        self.progress.warnings.extend(surfaced);

        if let Some(rejection) = outcome.rejected {
            debug!(row = rejection.row, code = rejection.code, "Row rejected");
            self.progress.rejected.push(rejection);
        }

        Ok(())
    }

    fn check_cancelled(&self) -> EtlResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(EtlError::Interrupted);
        }
        Ok(())
    }
}

fn delimited_ingestor(delimiter: char) -> EtlResult<DelimitedFileIngestor> {
    u8::try_from(delimiter)
        .map(DelimitedFileIngestor::new)
        .map_err(|_| EtlError::Config(format!("delimiter '{}' is not ASCII", delimiter)))
}
