//! Finalize-and-emit pipeline for New Relic serverless telemetry on AWS Lambda.
//!
//! A Lambda function cannot hold a long-lived connection to a collector, so
//! the agent's buffered data is encoded at the end of every invocation and
//! handed to whichever delivery channel the environment offers:
//!
//! - a named pipe read by a companion extension,
//! - the CloudWatch Logs API, or
//! - standard output, optionally split into size-bounded chunks.
//!
//! The payload is compressed JSON wrapped in a one-line envelope that the
//! log processor recognises by its marker.
//!
//! # Example
//!
//! ```no_run
//! use newrelic_lambda_telemetry::{AgentSession, ChannelSelector, Config, FinalizeHook, Transaction};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let hook = FinalizeHook::new(
//!     AgentSession::new(&config),
//!     ChannelSelector::from_config(&config),
//! );
//!
//! hook.record(Transaction::background("orders"));
//! hook.finalize().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod channel;
pub mod chunking;
pub mod cloudwatch;
pub mod config;
pub mod console;
pub mod encoder;
pub mod error;
pub mod finalize;

pub use agent::{AgentSession, Transaction, WebRequest, WebResponse};
pub use channel::{
    ChannelSelector, ChannelSelectorBuilder, DeliveryChannel, DeliveryError, DeliveryOutcome,
    NAMED_PIPE_PATH, TelemetrySink,
};
pub use chunking::{ChunkPolicy, Chunks, DEFAULT_CHUNK_CEILING};
pub use cloudwatch::{
    CloudWatchLogs, LogDestination, LogEvent, LogsApi, RemoteLogClient, RemoteLogError,
};
pub use config::{Config, ConfigBuilder, LogOutput};
pub use console::{Console, Stdout};
pub use encoder::{
    ENVELOPE_MARKER, ENVELOPE_VERSION, EncodeError, EncodedPayload, Envelope, decode_str,
};
pub use error::{Result, TelemetryError};
pub use finalize::FinalizeHook;
