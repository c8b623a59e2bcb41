//! The operator-facing log stream.
//!
//! The Overseer pushes structured [`LogRecord`]s into a [`LogSink`].
//! [`MemorySink`] keeps them for in-process assertions; [`TextSink`]
//! renders one `[<severity>] <text>` line per record for the CLI.

use std::fmt;
use std::io::{self, Write};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{RowRejection, Warning};
use crate::error::EtlError;

/// Log severities, most severe first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Notice
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Whether a record of this severity is shown at `verbosity`
    pub fn visible_at(self, verbosity: Severity) -> bool {
        self <= verbosity
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the log stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "record")]
pub enum LogRecord {
    /// A warning that survived the action's policy
    SqlWarning { action: String, warning: Warning },

    /// Emitted once per succeeded action
    ActionSummary { action: String, records_loaded: u64 },

    /// A row the row-oriented path refused
    RowRejected {
        action: String,
        rejection: RowRejection,
    },

    /// A fatal error, scoped to an action or to the requested target
    Fault {
        scope: String,
        kind: String,
        message: String,
    },

    /// Free-form progress text
    Message { severity: Severity, text: String },
}

impl LogRecord {
    pub fn fault(scope: impl Into<String>, err: &EtlError) -> Self {
        Self::Fault {
            scope: scope.into(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::Message {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    pub fn debug(text: impl Into<String>) -> Self {
        Self::Message {
            severity: Severity::Debug,
            text: text.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            // Notes too: one surfaced warning is always one line
            Self::SqlWarning { .. } => Severity::Warning,
            Self::ActionSummary { .. } => Severity::Notice,
            Self::RowRejected { .. } | Self::Fault { .. } => Severity::Error,
            Self::Message { severity, .. } => *severity,
        }
    }

    /// `[<severity>] <text>`
    pub fn render(&self) -> String {
        format!("[{}] {}", self.severity(), self)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SqlWarning { action, warning } => write!(f, "{}: {}", action, warning),
            Self::ActionSummary {
                action,
                records_loaded,
            } => write!(f, "{} records_loaded: {}", action, records_loaded),
            Self::RowRejected { action, rejection } => write!(
                f,
                "{}: row {} rejected: Error {}: {}",
                action, rejection.row, rejection.code, rejection.message
            ),
            Self::Fault { scope, message, .. } => write!(f, "{}: {}", scope, message),
            Self::Message { text, .. } => f.write_str(text),
        }
    }
}

/// Receiver of the log stream
pub trait LogSink {
    fn emit(&mut self, record: LogRecord);
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<LogRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Surfaced warnings, in emission order
    pub fn warnings(&self) -> Vec<&Warning> {
        self.records
            .iter()
            .filter_map(|r| match r {
                LogRecord::SqlWarning { warning, .. } => Some(warning),
                _ => None,
            })
            .collect()
    }

    /// `(action, records_loaded)` per summary line
    pub fn summaries(&self) -> Vec<(&str, u64)> {
        self.records
            .iter()
            .filter_map(|r| match r {
                LogRecord::ActionSummary {
                    action,
                    records_loaded,
                } => Some((action.as_str(), *records_loaded)),
                _ => None,
            })
            .collect()
    }

    pub fn faults(&self) -> Vec<&LogRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r, LogRecord::Fault { .. }))
            .collect()
    }

    /// Lines the CLI would print at `verbosity`
    pub fn lines(&self, verbosity: Severity) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.severity().visible_at(verbosity))
            .map(LogRecord::render)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn emit(&mut self, record: LogRecord) {
        self.records.push(record);
    }
}

/// Renders records as text lines.
///
/// Write errors cannot be returned from [`LogSink::emit`]; the first one
/// is kept and reported by [`TextSink::finish`].
pub struct TextSink<W: Write> {
    writer: W,
    verbosity: Severity,
    error: Option<io::Error>,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W, verbosity: Severity) -> Self {
        Self {
            writer,
            verbosity,
            error: None,
        }
    }

    /// Flush and hand back the writer
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> LogSink for TextSink<W> {
    fn emit(&mut self, record: LogRecord) {
        if self.error.is_some() || !record.severity().visible_at(self.verbosity) {
            return;
        }
        if let Err(err) = writeln!(self.writer, "{}", record.render()) {
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WarningLevel;

    fn warning(code: u32) -> Warning {
        Warning {
            code,
            message: "Out of range value for column 'qty' at row 1".to_string(),
            severity: WarningLevel::Warning,
            source_table: "readings".to_string(),
            row_number: Some(1),
        }
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Error.visible_at(Severity::Notice));
        assert!(Severity::Notice.visible_at(Severity::Notice));
        assert!(!Severity::Info.visible_at(Severity::Notice));
        assert!(Severity::Debug.visible_at(Severity::Debug));
        assert_eq!(Severity::default(), Severity::Notice);
    }

    #[test]
    fn test_summary_line() {
        let record = LogRecord::ActionSummary {
            action: "load_events".to_string(),
            records_loaded: 3,
        };
        assert_eq!(record.render(), "[notice] load_events records_loaded: 3");
    }

    #[test]
    fn test_warning_line() {
        let record = LogRecord::SqlWarning {
            action: "load_events".to_string(),
            warning: warning(1264),
        };
        assert_eq!(
            record.render(),
            "[warning] load_events: Warning 1264 on readings: Out of range value for column 'qty' at row 1"
        );
    }

    #[test]
    fn test_text_sink_filters_by_verbosity() {
        let mut sink = TextSink::new(Vec::new(), Severity::Warning);
        sink.emit(LogRecord::info("running action a"));
        sink.emit(LogRecord::ActionSummary {
            action: "a".to_string(),
            records_loaded: 1,
        });
        sink.emit(LogRecord::SqlWarning {
            action: "a".to_string(),
            warning: warning(1264),
        });

        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("[warning] a: Warning 1264"));
    }

    #[test]
    fn test_memory_sink_helpers() {
        let mut sink = MemorySink::new();
        sink.emit(LogRecord::ActionSummary {
            action: "a".to_string(),
            records_loaded: 2,
        });
        sink.emit(LogRecord::fault("a", &EtlError::Interrupted));

        assert_eq!(sink.summaries(), vec![("a", 2)]);
        assert_eq!(sink.faults().len(), 1);
        assert_eq!(
            sink.lines(Severity::Notice),
            vec![
                "[notice] a records_loaded: 2".to_string(),
                "[error] a: load interrupted".to_string()
            ]
        );
    }
}
