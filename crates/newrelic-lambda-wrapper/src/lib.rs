//! Runtime entry point for New Relic monitored Lambda functions.
//!
//! The wrapper resolves the user handler named by `NEW_RELIC_LAMBDA_HANDLER`
//! from a [`HandlerRegistry`], wraps it in the New Relic Tower layer and runs
//! it on the Lambda runtime. Every invocation is recorded as a transaction
//! and the agent session is finalized, through the named pipe, the
//! CloudWatch Logs API or stdout, before the handler's result is returned.
//!
//! # Example
//!
//! ```no_run
//! use lambda_runtime::LambdaEvent;
//! use newrelic_lambda_wrapper::{HandlerRegistry, run};
//! use serde_json::{Value, json};
//!
//! async fn handler(_event: LambdaEvent<Value>) -> Result<Value, lambda_runtime::Error> {
//!     Ok(json!({"statusCode": 200, "body": "ok"}))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // NEW_RELIC_LAMBDA_HANDLER=app.handler
//!     let registry = HandlerRegistry::new().register("app", "handler", handler);
//!     run(registry).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod logging;
mod registry;

pub use error::{HandlerError, WrapperError};
pub use logging::{init_tracing, log_directive};
pub use registry::{Handler, HandlerRegistry};

use lambda_runtime::Runtime;
use newrelic_lambda_telemetry::{ChannelSelector, Config, TelemetryError, TelemetrySink};
use newrelic_lambda_tower::NewRelicLayer;
use tower::ServiceBuilder;
use tower::util::BoxCloneService;

/// Builds the monitoring layer for the given configuration and sink.
pub fn newrelic_layer<K: TelemetrySink>(config: &Config, sink: K) -> NewRelicLayer<K> {
    NewRelicLayer::builder(sink).config(config).build()
}

/// Wraps a handler in the monitoring layer.
///
/// With `serverless_mode_enabled` off, the handler is returned as is and
/// nothing is recorded.
pub fn instrument<K: TelemetrySink>(config: &Config, sink: K, handler: Handler) -> Handler {
    if !config.serverless_mode_enabled {
        tracing::warn!("Serverless mode is disabled, invocations will not be monitored");
        return handler;
    }

    BoxCloneService::new(
        ServiceBuilder::new()
            .layer(newrelic_layer(config, sink))
            .service(handler),
    )
}

/// Resolves the configured handler without starting the runtime.
///
/// # Errors
///
/// Returns a [`HandlerError`] when the handler cannot be resolved.
pub fn resolve_handler(config: &Config, registry: &HandlerRegistry) -> Result<Handler, HandlerError> {
    registry.resolve(config.lambda_handler.as_deref())
}

/// Loads configuration, resolves the handler and runs the Lambda runtime.
///
/// Configuration and handler errors are reported before the runtime loop
/// starts, so a misconfigured function fails its first cold start.
///
/// # Errors
///
/// Returns a [`WrapperError`] if configuration loading, tracing set-up,
/// handler resolution or the runtime itself fails.
pub async fn run(registry: HandlerRegistry) -> Result<(), WrapperError> {
    let config = Config::load().map_err(TelemetryError::from)?;
    init_tracing(&config)?;

    let handler = resolve_handler(&config, &registry).inspect_err(|e| {
        tracing::error!(error = %e, handlers = ?registry.names(), "Failed to resolve handler");
    })?;

    tracing::info!(
        handler = config.lambda_handler.as_deref().unwrap_or_default(),
        cloudwatch_logs_api_mode = config.cloudwatch_logs_api_mode,
        to_cloudwatch_mode = config.to_cloudwatch_mode,
        "Starting New Relic Lambda wrapper"
    );

    let service = instrument(&config, ChannelSelector::from_config(&config), handler);

    // Runtime::new avoids the runtime's own tracing layer, whose invoke span
    // would outlive the finalize step.
    Runtime::new(service)
        .run()
        .await
        .map_err(WrapperError::Runtime)
}
