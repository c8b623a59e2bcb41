//! Command-line interface for overseer.
//!
//! Provides commands for running an action or pipeline, listing what the
//! configuration defines, and showing the resolved configuration.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::{locate_config, EtlConfig, WarningOptions};
use crate::core::Overseer;
use crate::load::SqliteStore;
use crate::report::{LogRecord, LogSink, Severity, TextSink};

/// overseer - configuration-driven ETL loader
#[derive(Parser, Debug)]
#[command(name = "overseer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to overseer.yaml here or in a parent directory)
    #[arg(short, long, global = true, env = "OVERSEER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an action or a pipeline
    Run {
        /// Action or pipeline name
        name: String,

        /// Local option for this run only (repeatable), e.g. hide_sql_warning_codes=1366
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Least severe log level to print
        #[arg(short, long, value_enum, default_value_t = Severity::Notice)]
        verbosity: Severity,

        /// SQLite database (overrides the configured one)
        #[arg(long)]
        database: Option<PathBuf>,

        /// SQL file executed before the run (creates target tables)
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// List configured actions and pipelines
    List,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command, returning the process exit status
    pub async fn execute(self) -> Result<i32> {
        let config_path = locate_config(self.config.as_deref())?;

        match self.command {
            Commands::Run {
                name,
                options,
                verbosity,
                database,
                schema,
            } => {
                run(
                    &config_path,
                    name,
                    &options,
                    verbosity,
                    database,
                    schema.as_deref(),
                )
                .await
            }
            Commands::List => list(&config_path),
            Commands::Config => show_config(&config_path),
        }
    }
}

fn load_config(path: &Path) -> Result<EtlConfig> {
    let config = EtlConfig::from_file(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;
    Ok(config)
}

/// Run an action or pipeline and map its outcome to the exit status
async fn run(
    config_path: &Path,
    name: String,
    options: &[String],
    verbosity: Severity,
    database: Option<PathBuf>,
    schema: Option<&Path>,
) -> Result<i32> {
    let config = load_config(config_path)?;
    let local_options = WarningOptions::from_assignments(options)?;

    let (store, opening) = open_store(&config, database)?;

    if let Some(schema) = schema {
        let sql = std::fs::read_to_string(schema)
            .with_context(|| format!("Failed to read schema file: {}", schema.display()))?;
        store
            .execute_batch(&sql)
            .with_context(|| format!("Failed to apply schema file: {}", schema.display()))?;
    }

    // Ctrl-C stops the in-flight statement and any further loader calls
    let cancel = Arc::new(AtomicBool::new(false));
    let interrupt = store.interrupt_handle();
    let watcher = tokio::spawn({
        let cancel = Arc::clone(&cancel);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::SeqCst);
                interrupt.interrupt();
            }
        }
    });

    let outcome = tokio::task::spawn_blocking(move || {
        let mut overseer = Overseer::new(config, store)
            .with_local_options(local_options)
            .with_cancel_flag(cancel);
        let mut sink = TextSink::new(io::stdout().lock(), verbosity);
        if let Some(record) = opening {
            sink.emit(record);
        }
        let outcome = overseer.run(&name, &mut sink);
        sink.finish().map(|_| outcome)
    })
    .await
    .context("Run task failed")?
    .context("Failed to write log stream")?;

    watcher.abort();

    Ok(outcome.exit_status)
}

/// Open the run's store. Falling back to memory is reported on the log stream.
fn open_store(
    config: &EtlConfig,
    database: Option<PathBuf>,
) -> Result<(SqliteStore, Option<LogRecord>)> {
    match database.or_else(|| config.database_path()) {
        Some(path) => {
            debug!(database = %path.display(), "Opening database");
            Ok((SqliteStore::open(&path)?, None))
        }
        None => {
            debug!("No database configured");
            let notice = LogRecord::Message {
                severity: Severity::Notice,
                text: "no database configured, using an in-memory store".to_string(),
            };
            Ok((SqliteStore::in_memory()?, Some(notice)))
        }
    }
}

/// Process exit code for an exit status (out-of-range values become 1)
pub fn exit_code(status: i32) -> ExitCode {
    ExitCode::from(u8::try_from(status).unwrap_or(1))
}

/// List actions and pipelines
fn list(config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;

    println!("Actions:");
    if config.actions.is_empty() {
        println!("  (none)");
    }
    for (name, action) in &config.actions {
        println!(
            "  {:<24} -> {} ({:?}, {})",
            name,
            action.target,
            action.mode,
            action.source.locator()
        );
        if let Some(description) = &action.description {
            println!("  {:<24}    {}", "", description);
        }
    }

    println!();
    println!("Pipelines:");
    if config.pipelines.is_empty() {
        println!("  (none)");
    }
    for (name, pipeline) in &config.pipelines {
        println!("  {:<24} {}", name, pipeline.actions.join(" -> "));
    }

    Ok(0)
}

/// Show the resolved configuration (for debugging)
fn show_config(config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;

    println!("Config file: {}", config_path.display());
    println!(
        "Database:    {}",
        config
            .database_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - in-memory)".to_string())
    );
    println!();
    print!(
        "{}",
        serde_yaml::to_string(&config).context("Failed to render configuration")?
    );

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "overseer",
            "run",
            "nightly",
            "-o",
            "hide_sql_warning_codes=1366",
            "-o",
            "hide_sql_warnings=false",
            "--verbosity",
            "warning",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                name,
                options,
                verbosity,
                ..
            } => {
                assert_eq!(name, "nightly");
                assert_eq!(options.len(), 2);
                assert_eq!(verbosity, Severity::Warning);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_default_verbosity() {
        let cli = Cli::try_parse_from(["overseer", "run", "a"]).unwrap();
        match cli.command {
            Commands::Run { verbosity, .. } => assert_eq!(verbosity, Severity::Notice),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_against_database_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("events.json"), r#"[{"id": 1, "kind": "boot"}]"#)
            .unwrap();
        std::fs::write(
            temp.path().join("schema.sql"),
            "CREATE TABLE events (id INTEGER PRIMARY KEY, kind VARCHAR(16));",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("overseer.yaml"),
            r#"
database: etl.sqlite
actions:
  load_events:
    source: { type: json_file, path: events.json }
    target: events
"#,
        )
        .unwrap();

        let config = temp.path().join("overseer.yaml");
        let schema = temp.path().join("schema.sql");
        let cli = Cli::try_parse_from([
            "overseer",
            "--config",
            config.to_str().unwrap(),
            "run",
            "load_events",
            "--schema",
            schema.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(cli.execute().await.unwrap(), 0);

        let store = SqliteStore::open(&temp.path().join("etl.sqlite")).unwrap();
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_in_memory_fallback_is_a_log_line() {
        let config = EtlConfig::from_yaml("actions: {}").unwrap();

        let (_store, notice) = open_store(&config, None).unwrap();
        assert_eq!(
            notice.unwrap().render(),
            "[notice] no database configured, using an in-memory store"
        );

        let temp = TempDir::new().unwrap();
        let (_store, notice) = open_store(&config, Some(temp.path().join("etl.sqlite"))).unwrap();
        assert!(notice.is_none());
    }

    #[tokio::test]
    async fn test_unknown_target_exit_status() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("overseer.yaml");
        std::fs::write(&config, "actions: {}\n").unwrap();

        let cli = Cli::try_parse_from(["overseer", "-c", config.to_str().unwrap(), "run", "x"])
            .unwrap();
        assert_eq!(cli.execute().await.unwrap(), 2);
    }
}
