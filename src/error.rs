//! Error taxonomy for action execution.
//!
//! Every variant here is fatal for the action that raised it. Field-level
//! coercion problems never show up as errors: they are diagnostics rows
//! that travel through the warning collector and filter instead.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for engine operations.
pub type EtlResult<T> = Result<T, EtlError>;

/// Exit status for an action that failed while loading or ingesting.
pub const EXIT_ACTION_FAILED: i32 = 1;

/// Exit status for a name or configuration that could not be resolved.
pub const EXIT_UNRESOLVED: i32 = 2;

/// Exit status after an operator interrupt (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Fatal conditions raised while running an action.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Directory or file missing or unreadable.
    #[error("source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structured content that parsed badly or had the wrong shape.
    #[error("malformed input in {path}: {reason}")]
    MalformedInput { path: PathBuf, reason: String },

    /// The warning retrieval query itself failed.
    #[error("diagnostics unavailable: {0}")]
    DiagnosticsUnavailable(String),

    /// The store went away mid-operation.
    #[error("connection lost: {message}")]
    ConnectionLost { message: String },

    /// The in-flight load was cancelled by the operator.
    #[error("load interrupted")]
    Interrupted,

    /// The engine refused the load outright (NOT NULL without default,
    /// unknown column, missing table).
    #[error("load into '{table}' rejected at row {row}: Error {code}: {message}")]
    LoadRejected {
        table: String,
        row: u64,
        code: u32,
        message: String,
    },

    /// No action or pipeline with that name exists.
    #[error("no action or pipeline named '{0}'")]
    UnknownTarget(String),

    /// The action's configuration could not be resolved (e.g. unset
    /// environment variable in a source locator).
    #[error("configuration error: {0}")]
    Config(String),
}

impl EtlError {
    /// Build a `SourceUnavailable` from an I/O error on `path`.
    pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Build a `MalformedInput` for `path`.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Process exit status this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => EXIT_INTERRUPTED,
            Self::UnknownTarget(_) | Self::Config(_) => EXIT_UNRESOLVED,
            _ => EXIT_ACTION_FAILED,
        }
    }

    /// Short machine-friendly name of the variant, used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::MalformedInput { .. } => "malformed_input",
            Self::DiagnosticsUnavailable(_) => "diagnostics_unavailable",
            Self::ConnectionLost { .. } => "connection_lost",
            Self::Interrupted => "interrupted",
            Self::LoadRejected { .. } => "load_rejected",
            Self::UnknownTarget(_) => "unknown_target",
            Self::Config(_) => "config",
        }
    }
}
