//! Structured logging setup: a `tracing`/`tracing-subscriber` pipeline
//! filtered by an environment variable, optionally also writing to a
//! rolling log file.

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::constants::LOG_ENV_VAR;

/// Initializes the global `tracing` subscriber. Console output always uses
/// the compact formatter; when `log_directory` is given, a second,
/// JSON-formatted, daily-rolling file layer is added alongside it.
///
/// The filter is read from [`LOG_ENV_VAR`] (falling back to `info` for every
/// target when unset), following the same `EnvFilter`-driven approach used
/// throughout this codebase rather than a fixed, hardcoded level.
pub fn init(log_directory: Option<&std::path::Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = || {
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let console_layer = fmt::layer().with_target(true).with_filter(env_filter());

    match log_directory {
        Some(log_directory) => {
            let file_appender = tracing_appender::rolling::daily(log_directory, "run-manager.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(env_filter());

            tracing_subscriber::registry()
                .with(console_layer)
                .with(file_layer)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(console_layer).init();
            None
        }
    }
}
