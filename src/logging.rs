use crate::config::AppConfig;
use crate::error::{LedgerError, Result};
use std::io::{self, IsTerminal};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Installs the global subscriber. `RUST_LOG` overrides `log_level`.
///
/// Console output goes to stderr; stdout carries the program's results. When
/// `log_to_file` is set the returned guard must be kept alive to flush the file.
pub fn init_logging(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            LedgerError::ConfigError(format!("invalid log_level {:?}: {}", config.log_level, e))
        })?;

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal());

    let (file_layer, guard) = if config.log_to_file {
        let file_appender = match config.rotation.as_str() {
            "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
            "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
            _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
        };
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = if config.use_json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(non_blocking)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::layer()
                .with_target(false)
                .with_writer(non_blocking)
                .with_ansi(false)
                .boxed()
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LedgerError::ConfigError(format!("logging already initialised: {}", e)))?;

    Ok(guard)
}
