//! Logging setup
//! Console output plus an optional rolling JSON log file

use crate::config::LoggingConfig;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_NAME: &str = "sotaria-apiserver.log";

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hourly" => Some(LogRotation::Hourly),
            "daily" => Some(LogRotation::Daily),
            "never" => Some(LogRotation::Never),
            _ => None,
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must be held for the lifetime of the process when file logging is on.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let console_layer = if config.json {
        fmt::layer()
            .with_target(true)
            .json()
            .with_writer(io::stdout)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .with_writer(io::stdout)
            .boxed()
    };

    let (file_layer, guard) = match config.log_dir {
        Some(ref dir) => {
            let rotation = LogRotation::parse(&config.rotation).unwrap_or(LogRotation::Daily);
            let file_appender = match rotation {
                LogRotation::Hourly => rolling::hourly(dir, LOG_FILE_NAME),
                LogRotation::Daily => rolling::daily(dir, LOG_FILE_NAME),
                LogRotation::Never => rolling::never(dir, LOG_FILE_NAME),
            };
            let (writer, guard) = non_blocking(file_appender);

            let layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(level = %config.level, json = config.json, "Logging initialized");

    Ok(guard)
}
