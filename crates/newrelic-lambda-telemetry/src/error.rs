//! Error types for the telemetry pipeline.

use crate::channel::DeliveryError;
use crate::cloudwatch::RemoteLogError;
use crate::encoder::EncodeError;
use thiserror::Error;

/// A specialised Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors that can occur in the telemetry pipeline.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration error.
    #[error("configuration error")]
    Config(#[source] Box<figment::Error>),

    /// Payload encoding error.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Delivery error.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Remote log API error.
    #[error(transparent)]
    RemoteLog(#[from] RemoteLogError),
}

impl From<figment::Error> for TelemetryError {
    fn from(err: figment::Error) -> Self {
        TelemetryError::Config(Box::new(err))
    }
}
