//! Metadata extraction from raw Lambda events.
//!
//! Every function here works on the untyped JSON event so that a single layer
//! can wrap handlers for any trigger. None of them fail: a shape that does not
//! match simply yields nothing.
//!
//! - [`event_type`] - classification against the static event-source table
//! - [`event_source`] - the ARN of the resource that triggered the invocation
//! - [`http`] - request and response facts for web transactions
//! - [`path`] - the key-path lookup the others are built on

pub mod event_source;
pub mod event_type;
pub mod http;
pub mod path;
