//! New Relic Lambda workspace: end-to-end tests for the monitoring wrapper.
//!
//! This package holds no code of its own. The functionality lives in the
//! workspace member crates:
//!
//! - `newrelic-lambda-telemetry`: agent session, payload encoding, delivery
//!   channels (named pipe, CloudWatch Logs API, stdout with chunking)
//! - `newrelic-lambda-tower`: Tower middleware recording a transaction per
//!   invocation and finalizing before the handler's result is returned
//! - `newrelic-lambda-wrapper`: handler resolution and the runtime entry point
