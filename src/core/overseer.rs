//! Top-level driver.
//!
//! Resolves a requested name to an action or a pipeline, runs it and
//! writes the log stream: one line per surfaced warning, one summary per
//! succeeded action, one fault line per failure.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::action::Action;
use super::CancelFlag;
use crate::config::{EtlConfig, WarningOptions};
use crate::domain::{RunOutcome, TargetKind};
use crate::error::{EtlError, EtlResult};
use crate::load::Loader;
use crate::report::{LogRecord, LogSink, Severity};

/// Runs actions and pipelines against one loader.
///
/// The loader (and its connection) lives as long as the Overseer; each
/// action commits through it independently.
pub struct Overseer<L: Loader> {
    config: EtlConfig,
    loader: L,
    local_options: WarningOptions,
    cancel: CancelFlag,
}

impl<L: Loader> Overseer<L> {
    pub fn new(config: EtlConfig, loader: L) -> Self {
        Self {
            config,
            loader,
            local_options: WarningOptions::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Options given for this invocation only
    pub fn with_local_options(mut self, options: WarningOptions) -> Self {
        self.local_options = options;
        self
    }

    /// Share a cancellation flag with a signal handler
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// What `name` refers to, and the actions it runs in order
    pub fn resolve(&self, name: &str) -> EtlResult<(TargetKind, Vec<String>)> {
        if self.config.actions.contains_key(name) {
            return Ok((TargetKind::Action, vec![name.to_string()]));
        }
        if let Some(pipeline) = self.config.pipelines.get(name) {
            return Ok((TargetKind::Pipeline, pipeline.actions.clone()));
        }
        Err(EtlError::UnknownTarget(name.to_string()))
    }

    /// Run an action or pipeline by name.
    #[instrument(skip(self, sink), fields(invocation = %Uuid::new_v4()))]
    pub fn run(&mut self, name: &str, sink: &mut dyn LogSink) -> RunOutcome {
        let (kind, members) = match self.resolve(name) {
            Ok(resolved) => resolved,
            Err(err) => {
                debug!(error = %err, "Cannot resolve target");
                sink.emit(LogRecord::fault(name, &err));
                return RunOutcome {
                    target: name.to_string(),
                    kind: TargetKind::Unresolved,
                    results: Vec::new(),
                    failed_action: None,
                    error: Some(err.to_string()),
                    exit_status: err.exit_code(),
                };
            }
        };

        if kind == TargetKind::Pipeline {
            info!(actions = members.len(), "Starting pipeline");
            sink.emit(LogRecord::info(format!(
                "pipeline {} started: {} actions",
                name,
                members.len()
            )));
        }

        let mut outcome = RunOutcome {
            target: name.to_string(),
            kind,
            results: Vec::with_capacity(members.len()),
            failed_action: None,
            error: None,
            exit_status: 0,
        };

        for member in &members {
            let Some(spec) = self.config.actions.get(member) else {
                let err = EtlError::UnknownTarget(member.clone());
                sink.emit(LogRecord::fault(member.as_str(), &err));
                outcome.failed_action = Some(member.clone());
                outcome.error = Some(err.to_string());
                outcome.exit_status = err.exit_code();
                break;
            };

            sink.emit(LogRecord::info(format!("running action {}", member)));
            let action = Action::new(member, spec, &self.local_options, Arc::clone(&self.cancel));
            let (result, failure) = action.run(&self.config, &mut self.loader);

            for warning in &result.warnings {
                sink.emit(LogRecord::SqlWarning {
                    action: member.clone(),
                    warning: warning.clone(),
                });
            }
            for rejection in &result.rejected_rows {
                sink.emit(LogRecord::RowRejected {
                    action: member.clone(),
                    rejection: rejection.clone(),
                });
            }
            if result.suppressed_warnings > 0 {
                sink.emit(LogRecord::debug(format!(
                    "{}: {} warnings hidden by policy",
                    member, result.suppressed_warnings
                )));
            }

            match failure {
                None => sink.emit(LogRecord::ActionSummary {
                    action: member.clone(),
                    records_loaded: result.records_loaded,
                }),
                Some(err) => {
                    debug!(action = %member, error = %err, "Action failed");
                    sink.emit(LogRecord::fault(member.as_str(), &err));
                    outcome.failed_action = Some(member.clone());
                    outcome.error = Some(err.to_string());
                    outcome.exit_status = err.exit_code();
                }
            }

            outcome.results.push(result);
            if outcome.failed_action.is_some() {
                break;
            }
        }

        if kind == TargetKind::Pipeline {
            match &outcome.failed_action {
                None => sink.emit(LogRecord::info(format!(
                    "pipeline {} completed: {} actions",
                    name,
                    outcome.results.len()
                ))),
                Some(failed) => sink.emit(LogRecord::Message {
                    severity: Severity::Error,
                    text: format!("pipeline {} aborted at action {}", name, failed),
                }),
            }
        }

        outcome
    }
}
