//! overseer CLI entrypoint

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use overseer::cli::{exit_code, Cli};
use overseer::error::EXIT_UNRESOLVED;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing; stdout only, stderr is reserved for startup errors
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stdout),
        )
        .init();

    // Parse and execute CLI
    let cli = Cli::parse();
    match cli.execute().await {
        Ok(status) => exit_code(status),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code(EXIT_UNRESOLVED)
        }
    }
}
