//! vitalsdesk - command-line admin console for the health-tracking backend.
//!
//! Every invocation runs one action (list, show, create, update, delete) or
//! watches a list until interrupted. Reads go through the query cache, so a
//! mutation refreshes the lists it affects.

mod cli;
mod commands;
mod output;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vitalsdesk_core::cache::CacheError;
use vitalsdesk_core::Config;

use cli::Cli;
use commands::Context;

// ============================================================================
// Constants
// ============================================================================

/// File name prefix for the daily rolling log.
const LOG_FILE_PREFIX: &str = "vitalsdesk.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the log file on drop and must live until exit.
fn init_tracing(log_dir: Option<&Path>, verbose: bool) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load()?;
    let _log_guard = init_tracing(config.log_dir.as_deref(), cli.verbose);
    debug!(command = ?cli.command, "vitalsdesk starting");

    let mut ctx = Context::new(config, cli.base_url, cli.json)?;
    let result = commands::run(&mut ctx, cli.command).await;
    ctx.api.dispose();

    if let Err(ref e) = result {
        if e
            .downcast_ref::<CacheError>()
            .and_then(CacheError::api_error)
            .is_some_and(|api| api.is_unauthorized())
        {
            eprintln!("Not authorized. Run `vitalsdesk login` and try again.");
        }
    }

    info!("vitalsdesk done");
    result
}
