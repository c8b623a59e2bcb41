//! Domain types shared by ingestors, loaders and the orchestration layer.
//!
//! - Warning: normalized load diagnostics
//! - IngestRecord / FileDescriptor: what flows from sources to loaders
//! - ActionResult / RunOutcome: terminal results

pub mod record;
pub mod result;
pub mod warning;

pub use record::{FileDescriptor, IngestRecord};
pub use result::{ActionResult, ActionState, RowRejection, RunOutcome, TargetKind};
pub use warning::{Warning, WarningLevel};
