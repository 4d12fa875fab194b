//! Error types for handler resolution and wrapper start-up.

use newrelic_lambda_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised while resolving `NEW_RELIC_LAMBDA_HANDLER`.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler variable is unset or empty.
    #[error("no value specified in NEW_RELIC_LAMBDA_HANDLER environment variable")]
    Missing,

    /// The handler value has no `module.function` form.
    #[error("improperly formatted handler value: {0}")]
    Malformed(String),

    /// No handlers were registered under the module.
    #[error("failed to find module: {0}")]
    ModuleNotFound(String),

    /// The module exists but has no such function.
    #[error("no handler {function} in module {module}")]
    FunctionNotFound {
        /// Module part of the handler value.
        module: String,
        /// Function part of the handler value.
        function: String,
    },
}

/// Errors that stop the wrapper before the runtime loop starts.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WrapperError {
    /// Configuration or telemetry pipeline error.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Handler resolution error.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// A global tracing subscriber was already installed.
    #[error("failed to initialise tracing subscriber")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    /// The Lambda runtime loop ended with an error.
    #[error("lambda runtime error: {0}")]
    Runtime(lambda_runtime::Error),
}
