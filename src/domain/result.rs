//! Action and run outcomes.
//!
//! An `ActionResult` is built once, when an action reaches a terminal
//! state. A `RunOutcome` aggregates the results of one Overseer invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::warning::Warning;

/// Lifecycle of a single action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ActionState {
    /// Not started yet
    Pending,

    /// Ingesting and loading
    Running,

    /// Finished; warnings never move an action out of this state
    Succeeded,

    /// Aborted by a fatal error
    Failed { error: String },
}

impl Default for ActionState {
    fn default() -> Self {
        Self::Pending
    }
}

/// A row the row-oriented path refused while the batch carried on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    /// 1-based position of the record within its source
    pub row: u64,

    /// Vendor error code
    pub code: u32,

    pub message: String,
}

/// Outcome of one action execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Action name as configured
    pub name: String,

    /// Target table
    pub target: String,

    /// Rows committed by this execution
    pub records_loaded: u64,

    /// Warnings that survived the policy, in engine order
    pub warnings: Vec<Warning>,

    /// How many collected warnings the policy hid
    pub suppressed_warnings: usize,

    /// Rows refused by the row-oriented path
    pub rejected_rows: Vec<RowRejection>,

    /// Source files ingested (1 for single-file sources)
    pub files_processed: usize,

    /// Terminal state
    pub state: ActionState,

    /// 0 on success, non-zero on failure
    pub exit_status: i32,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl ActionResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.state, ActionState::Succeeded)
    }

    /// Error text of a failed action
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ActionState::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// What a requested name resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Action,
    Pipeline,
    Unresolved,
}

/// Aggregate of one Overseer invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The name that was requested
    pub target: String,

    pub kind: TargetKind,

    /// Results of every action that reached a terminal state, in run order
    pub results: Vec<ActionResult>,

    /// First action that failed, if any
    pub failed_action: Option<String>,

    /// Error raised before any action could run (resolution, cancellation)
    pub error: Option<String>,

    /// Process exit status for the whole invocation
    pub exit_status: i32,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }

    /// Result for the named action, if it ran
    pub fn result(&self, action: &str) -> Option<&ActionResult> {
        self.results.iter().find(|r| r.name == action)
    }

    /// `records_loaded` per action, in run order
    pub fn records_loaded(&self) -> Vec<u64> {
        self.results.iter().map(|r| r.records_loaded).collect()
    }
}
