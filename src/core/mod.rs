//! Core orchestration logic.
//!
//! This module contains:
//! - Action: one source loaded into one table
//! - Pipeline: ordered actions, fail-fast
//! - Overseer: resolves a name and drives the run

pub mod action;
pub mod overseer;
pub mod pipeline;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

// Re-export commonly used types
pub use action::{Action, ActionSpec, SourceSpec};
pub use overseer::Overseer;
pub use pipeline::PipelineSpec;

/// Set to stop the run before the next loader call.
pub type CancelFlag = Arc<AtomicBool>;
