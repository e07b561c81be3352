//! Logging setup for the command-line tool
//!
//! Logs go to stderr so stdout carries only tables or JSON.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::LogFormat;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset
    pub default_filter: String,
    pub format: LogFormat,
    /// Whether to include file/line information in logs
    pub include_location: bool,
}

impl LoggingConfig {
    /// Map `-v` occurrences to a filter
    pub fn from_verbosity(verbose: u8, format: LogFormat) -> Self {
        let default_filter = match verbose {
            0 => "warn,tablesync=info,tablesync_migrate=info,tablesync_connection=info",
            1 => "info,tablesync=debug,tablesync_migrate=debug,tablesync_connection=debug,tablesync_driver_mysql=debug",
            _ => "debug,tablesync=trace,tablesync_migrate=trace,tablesync_driver_mysql=trace",
        }
        .to_string();

        Self {
            default_filter,
            format,
            include_location: verbose > 1,
        }
    }
}

/// Initialize the global subscriber
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    // RUST_LOG takes precedence over the default filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let layer = match config.format {
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;
    tracing::debug!(filter = %config.default_filter, "logging initialized");
    Ok(())
}
