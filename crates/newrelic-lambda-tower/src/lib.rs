//! New Relic Tower middleware for AWS Lambda.
//!
//! This crate provides a Tower middleware layer that records a New Relic
//! transaction for every Lambda invocation. It classifies the triggering
//! event, extracts HTTP request and response facts for web invocations,
//! attaches Lambda agent attributes (request id, function ARN, event source,
//! cold start) and, before the handler's result is returned, finalizes the
//! agent session into a [`TelemetrySink`].
//!
//! # Usage
//!
//! ```no_run
//! use lambda_runtime::{service_fn, Error, LambdaEvent};
//! use newrelic_lambda_telemetry::{ChannelSelector, Config};
//! use newrelic_lambda_tower::NewRelicLayer;
//! use serde_json::Value;
//! use tower::ServiceBuilder;
//!
//! async fn handler(_event: LambdaEvent<Value>) -> Result<Value, Error> {
//!     tracing::info!("Processing request");
//!     Ok(serde_json::json!({"statusCode": 200}))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let config = Config::default();
//!     let layer = NewRelicLayer::builder(ChannelSelector::from_config(&config))
//!         .config(&config)
//!         .build();
//!
//!     let service = ServiceBuilder::new()
//!         .layer(layer)
//!         .service(service_fn(handler));
//!
//!     lambda_runtime::run(service).await
//! }
//! ```
//!
//! # Web and background transactions
//!
//! - **REST API / ALB**: `httpMethod` and `path` at the top level
//! - **HTTP API (v2)**: `requestContext.http.method` and `.path`
//! - **Everything else** (SQS, SNS, S3, schedules, ...): background task
//!
//! The handler's result, including its error, is always returned unchanged.
//!
//! [`TelemetrySink`]: newrelic_lambda_telemetry::TelemetrySink

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cold_start;
mod future;
mod layer;
mod service;

pub mod extractors;

pub use cold_start::ColdStart;
pub use extractors::event_source::extract_event_source_arn;
pub use extractors::event_type::{EVENT_TYPES, EventType, detect_event_type};
pub use extractors::http::{extract_request, process_response};
pub use future::NewRelicFuture;
pub use layer::{NewRelicLayer, NewRelicLayerBuilder};
pub use service::NewRelicService;
