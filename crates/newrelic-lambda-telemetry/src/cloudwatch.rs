//! Direct delivery to CloudWatch Logs.
//!
//! The remote-log channel appends the enveloped payload as a single event to
//! the function's own log stream. The stream is created on every delivery
//! (the call fails harmlessly once it exists) and the write is attempted
//! exactly once; any failure is returned to the channel selector, which falls
//! back to stdout.

use aws_sdk_cloudwatchlogs::Client;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::OnceCell;

const LOG_GROUP_ENV: &str = "AWS_LAMBDA_LOG_GROUP_NAME";
const LOG_STREAM_ENV: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

/// Error from the remote log API.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RemoteLogError {
    /// The log group or stream name is not available.
    #[error("log destination not configured: {0} is unset")]
    MissingDestination(&'static str),

    /// An API call failed.
    #[error("{operation} failed")]
    Api {
        /// The API operation that failed.
        operation: &'static str,
        /// Underlying SDK error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl RemoteLogError {
    /// Wraps an SDK error for the named operation.
    pub fn api<E>(operation: &'static str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Api {
            operation,
            source: Box::new(error),
        }
    }
}

/// Log group and stream that receive remote-log deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDestination {
    /// Log group name.
    pub group: String,
    /// Log stream name.
    pub stream: String,
}

impl LogDestination {
    /// Creates a destination from explicit names.
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
        }
    }

    /// Reads the function's own log group and stream from the environment.
    pub fn from_env() -> Result<Self, RemoteLogError> {
        let read = |name: &'static str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(RemoteLogError::MissingDestination(name))
        };

        Ok(Self::new(read(LOG_GROUP_ENV)?, read(LOG_STREAM_ENV)?))
    }
}

/// A single log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Event body.
    pub message: String,
}

impl LogEvent {
    /// Creates an event stamped with the current time.
    pub fn now(message: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        Self {
            timestamp_ms,
            message: message.into(),
        }
    }
}

/// The two CloudWatch Logs operations the remote-log channel needs.
pub trait LogsApi: Send + Sync + 'static {
    /// Creates a log stream. Fails if it already exists.
    fn create_log_stream(
        &self,
        destination: &LogDestination,
    ) -> impl Future<Output = Result<(), RemoteLogError>> + Send;

    /// Appends events to a log stream.
    fn put_log_events(
        &self,
        destination: &LogDestination,
        events: Vec<LogEvent>,
    ) -> impl Future<Output = Result<(), RemoteLogError>> + Send;
}

/// [`LogsApi`] backed by the AWS SDK.
///
/// The SDK client is built on first use from the default credential and
/// region chain, then kept for the life of the process.
#[derive(Debug, Default)]
pub struct CloudWatchLogs {
    client: OnceCell<Client>,
}

impl CloudWatchLogs {
    /// Creates an API handle that loads AWS configuration lazily.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an API handle around an existing SDK client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                Client::new(&config)
            })
            .await
    }
}

impl LogsApi for CloudWatchLogs {
    async fn create_log_stream(&self, destination: &LogDestination) -> Result<(), RemoteLogError> {
        self.client()
            .await
            .create_log_stream()
            .log_group_name(&destination.group)
            .log_stream_name(&destination.stream)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| RemoteLogError::api("CreateLogStream", e.into_service_error()))
    }

    async fn put_log_events(
        &self,
        destination: &LogDestination,
        events: Vec<LogEvent>,
    ) -> Result<(), RemoteLogError> {
        let events = events
            .into_iter()
            .map(|event| {
                InputLogEvent::builder()
                    .timestamp(event.timestamp_ms)
                    .message(event.message)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RemoteLogError::api("PutLogEvents", e))?;

        self.client()
            .await
            .put_log_events()
            .log_group_name(&destination.group)
            .log_stream_name(&destination.stream)
            .set_log_events(Some(events))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| RemoteLogError::api("PutLogEvents", e.into_service_error()))
    }
}

/// Writes one payload per call to a log stream.
#[derive(Debug)]
pub struct RemoteLogClient<L = CloudWatchLogs> {
    api: L,
    destination: Option<LogDestination>,
}

impl RemoteLogClient<CloudWatchLogs> {
    /// Creates a client using the AWS SDK.
    pub fn new() -> Self {
        Self::with_api(CloudWatchLogs::new())
    }
}

impl Default for RemoteLogClient<CloudWatchLogs> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: LogsApi> RemoteLogClient<L> {
    /// Creates a client over any [`LogsApi`] implementation.
    pub fn with_api(api: L) -> Self {
        Self {
            api,
            destination: None,
        }
    }

    /// Pins the destination instead of reading it from the environment.
    pub fn with_destination(mut self, destination: LogDestination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Returns the underlying API.
    pub fn api(&self) -> &L {
        &self.api
    }

    /// Ensures the log stream exists, then appends one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination is unknown or the write fails.
    /// A failure to create the stream is not an error.
    pub async fn put(&self, message: String) -> Result<(), RemoteLogError> {
        let destination = match &self.destination {
            Some(destination) => destination.clone(),
            None => LogDestination::from_env()?,
        };

        if let Err(e) = self.api.create_log_stream(&destination).await {
            tracing::debug!(
                error = %e,
                group = %destination.group,
                stream = %destination.stream,
                "Could not create log stream, assuming it exists"
            );
        }

        self.api
            .put_log_events(&destination, vec![LogEvent::now(message)])
            .await
    }
}
