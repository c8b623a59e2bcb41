//! Normalized load warnings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Level reported by the engine for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Warning,
    Note,
}

impl WarningLevel {
    /// Engine spelling, as stored in the diagnostics area.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "Warning",
            Self::Note => "Note",
        }
    }

    /// Parse an engine level. Anything that is not a note is treated as a
    /// warning, so an unexpected level is still surfaced.
    pub fn from_engine(level: &str) -> Self {
        if level.trim().eq_ignore_ascii_case("note") {
            Self::Note
        } else {
            Self::Warning
        }
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single data-quality diagnostic produced by a load.
///
/// Two warnings with the same code and message on different rows are
/// distinct values; nothing downstream deduplicates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Vendor diagnostic code (e.g. 1264 for an out-of-range value)
    pub code: u32,

    /// Engine message, verbatim
    pub message: String,

    /// Warning or note
    pub severity: WarningLevel,

    /// Table the load targeted
    pub source_table: String,

    /// 1-based row within the load call, when the engine reported one
    pub row_number: Option<u64>,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on {}: {}",
            self.severity, self.code, self.source_table, self.message
        )
    }
}
