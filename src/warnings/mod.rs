//! Load warning capture and suppression.
//!
//! ```text
//! load call → diagnostics area → collector::collect → WarningPolicy::apply → log stream
//! ```

pub mod collector;
pub mod filter;

pub use collector::{collect, DiagnosticRow, DiagnosticsError, RawDiagnostics};
pub use filter::WarningPolicy;
