//! Tracing subscriber set-up for the wrapper's own log lines.

use crate::error::WrapperError;
use newrelic_lambda_telemetry::{Config, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the filter comes from
/// `NEW_RELIC_LOG_LEVEL`, or is `off` when `NEW_RELIC_LOG_ENABLED` is false.
/// Timestamps are omitted as Lambda stamps every line itself.
///
/// # Errors
///
/// Returns [`WrapperError::Tracing`] if a global subscriber is already set.
pub fn init_tracing(config: &Config) -> Result<(), WrapperError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(config)));

    let writer = match config.log {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        _ => BoxMakeWriter::new(std::io::stdout),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .without_time()
                .with_writer(writer),
        )
        .with(filter)
        .try_init()?;

    Ok(())
}

/// Maps the configured level onto a filter directive.
///
/// Accepts the tracing level names plus `warning`, `critical` and `fatal`.
/// Anything unrecognised falls back to `info`.
pub fn log_directive(config: &Config) -> &'static str {
    if !config.log_enabled {
        return "off";
    }

    match config.log_level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        "off" => "off",
        _ => "info",
    }
}
