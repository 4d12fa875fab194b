//! Delivery-channel selection.
//!
//! Each finalized payload is handed to exactly one channel, picked fresh on
//! every call (first match wins):
//!
//! 1. **Named pipe** – a companion extension is listening on
//!    `/tmp/newrelic-telemetry`. The envelope is written once; a failure is
//!    final because the extension owns delivery from here on.
//! 2. **Remote log** – CloudWatch Logs API mode is enabled. A failure falls
//!    back to the stdout channel.
//! 3. **Stdout** – the default. Chunked when the destination has a size
//!    ceiling.

use crate::chunking::ChunkPolicy;
use crate::cloudwatch::{CloudWatchLogs, LogDestination, LogsApi, RemoteLogClient};
use crate::config::Config;
use crate::console::{Console, Stdout};
use crate::encoder::{EncodedPayload, Envelope};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Path the companion extension listens on.
pub const NAMED_PIPE_PATH: &str = "/tmp/newrelic-telemetry";

/// The channel a payload is delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    /// Local named pipe read by a companion extension.
    NamedPipe,
    /// CloudWatch Logs API.
    RemoteLog,
    /// Standard output.
    Stdout,
}

impl DeliveryChannel {
    /// Picks the channel from the two environment signals.
    pub fn select(pipe_exists: bool, remote_log_enabled: bool) -> Self {
        if pipe_exists {
            Self::NamedPipe
        } else if remote_log_enabled {
            Self::RemoteLog
        } else {
            Self::Stdout
        }
    }
}

/// What happened to a delivered payload.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Written to the named pipe.
    NamedPipe,
    /// Accepted by the remote log API.
    RemoteLog,
    /// Written to stdout as the given number of envelopes.
    Stdout {
        /// Number of envelope lines written.
        envelopes: usize,
    },
    /// The remote log API failed and the payload went to stdout instead.
    StdoutFallback {
        /// Number of envelope lines written.
        envelopes: usize,
    },
}

/// Error from a delivery channel with no further fallback.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Writing to the named pipe failed.
    #[error("failed to write to named pipe {}", path.display())]
    NamedPipe {
        /// Pipe path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing to stdout failed.
    #[error("failed to write envelope to stdout")]
    Stdout(#[source] std::io::Error),

    /// The envelope could not be serialised.
    #[error("failed to serialise envelope")]
    Envelope(#[from] serde_json::Error),
}

/// Receives finalized payloads in place of the agent's network transmit step.
pub trait TelemetrySink: Clone + Send + Sync + 'static {
    /// Delivers one payload. Called exactly once per finalize.
    fn deliver(
        &self,
        payload: EncodedPayload,
    ) -> impl Future<Output = Result<DeliveryOutcome, DeliveryError>> + Send;
}

/// The production [`TelemetrySink`]: named pipe, remote log or stdout.
///
/// # Type Parameters
///
/// * `L` - The CloudWatch Logs API implementation
/// * `C` - The console used for the stdout channel
pub struct ChannelSelector<L = CloudWatchLogs, C = Stdout> {
    inner: Arc<Inner<L, C>>,
}

struct Inner<L, C> {
    pipe_path: PathBuf,
    remote_log_enabled: bool,
    chunking: ChunkPolicy,
    remote: RemoteLogClient<L>,
    console: C,
}

impl<L, C> Clone for ChannelSelector<L, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ChannelSelector {
    /// Creates a selector from configuration with the default pipe path,
    /// the AWS SDK and the process's stdout.
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .remote_log(config.cloudwatch_logs_api_mode)
            .chunk_policy(ChunkPolicy::from_config(config))
            .build()
    }

    /// Creates a builder for more detailed configuration.
    pub fn builder() -> ChannelSelectorBuilder {
        ChannelSelectorBuilder::new()
    }
}

impl<L: LogsApi, C: Console> ChannelSelector<L, C> {
    /// Returns the named pipe path checked on each delivery.
    pub fn pipe_path(&self) -> &Path {
        &self.inner.pipe_path
    }

    /// Returns the channel a delivery made now would use.
    pub async fn current_channel(&self) -> DeliveryChannel {
        let pipe_exists = tokio::fs::try_exists(&self.inner.pipe_path)
            .await
            .unwrap_or(false);
        DeliveryChannel::select(pipe_exists, self.inner.remote_log_enabled)
    }

    async fn write_pipe(&self, payload: &EncodedPayload) -> Result<(), DeliveryError> {
        let path = &self.inner.pipe_path;
        let line = payload.envelope().to_line()?;
        let pipe_error = |source| DeliveryError::NamedPipe {
            path: path.clone(),
            source,
        };

        let mut pipe = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(pipe_error)?;
        pipe.write_all(line.as_bytes()).await.map_err(pipe_error)?;
        pipe.flush().await.map_err(pipe_error)
    }

    fn write_stdout(&self, payload: &EncodedPayload) -> Result<usize, DeliveryError> {
        let mut envelopes = 0;
        for chunk in self.inner.chunking.split(payload) {
            let line = Envelope::new(chunk).to_line()?;
            self.inner
                .console
                .write_line(&line)
                .map_err(DeliveryError::Stdout)?;
            envelopes += 1;
        }
        Ok(envelopes)
    }
}

impl<L: LogsApi, C: Console> TelemetrySink for ChannelSelector<L, C> {
    async fn deliver(&self, payload: EncodedPayload) -> Result<DeliveryOutcome, DeliveryError> {
        let channel = self.current_channel().await;
        tracing::debug!(?channel, bytes = payload.len(), "Delivering telemetry payload");

        match channel {
            DeliveryChannel::NamedPipe => {
                self.write_pipe(&payload).await?;
                Ok(DeliveryOutcome::NamedPipe)
            }
            DeliveryChannel::RemoteLog => {
                let line = payload.envelope().to_line()?;
                match self.inner.remote.put(line).await {
                    Ok(()) => Ok(DeliveryOutcome::RemoteLog),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "CloudWatch Logs delivery failed, falling back to stdout"
                        );
                        let envelopes = self.write_stdout(&payload)?;
                        Ok(DeliveryOutcome::StdoutFallback { envelopes })
                    }
                }
            }
            DeliveryChannel::Stdout => {
                let envelopes = self.write_stdout(&payload)?;
                Ok(DeliveryOutcome::Stdout { envelopes })
            }
        }
    }
}

/// Builder for configuring a [`ChannelSelector`].
#[must_use = "builders do nothing unless .build() is called"]
pub struct ChannelSelectorBuilder<L = CloudWatchLogs, C = Stdout> {
    pipe_path: PathBuf,
    remote_log_enabled: bool,
    chunking: ChunkPolicy,
    remote: RemoteLogClient<L>,
    console: C,
}

impl ChannelSelectorBuilder {
    /// Creates a builder with the default pipe path, remote-log mode off,
    /// no chunking, the AWS SDK and the process's stdout.
    pub fn new() -> Self {
        Self {
            pipe_path: PathBuf::from(NAMED_PIPE_PATH),
            remote_log_enabled: false,
            chunking: ChunkPolicy::Unlimited,
            remote: RemoteLogClient::new(),
            console: Stdout,
        }
    }
}

impl Default for ChannelSelectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<L, C> ChannelSelectorBuilder<L, C> {
    /// Sets the named pipe path.
    pub fn named_pipe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pipe_path = path.into();
        self
    }

    /// Enables or disables the remote-log channel.
    pub fn remote_log(mut self, enabled: bool) -> Self {
        self.remote_log_enabled = enabled;
        self
    }

    /// Sets the stdout chunking policy.
    pub fn chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.chunking = policy;
        self
    }

    /// Replaces the CloudWatch Logs API implementation.
    pub fn logs_api<L2: LogsApi>(self, api: L2) -> ChannelSelectorBuilder<L2, C> {
        ChannelSelectorBuilder {
            pipe_path: self.pipe_path,
            remote_log_enabled: self.remote_log_enabled,
            chunking: self.chunking,
            remote: RemoteLogClient::with_api(api),
            console: self.console,
        }
    }

    /// Replaces the console used by the stdout channel.
    pub fn console<C2: Console>(self, console: C2) -> ChannelSelectorBuilder<L, C2> {
        ChannelSelectorBuilder {
            pipe_path: self.pipe_path,
            remote_log_enabled: self.remote_log_enabled,
            chunking: self.chunking,
            remote: self.remote,
            console,
        }
    }

    /// Builds the selector.
    pub fn build(self) -> ChannelSelector<L, C> {
        ChannelSelector {
            inner: Arc::new(Inner {
                pipe_path: self.pipe_path,
                remote_log_enabled: self.remote_log_enabled,
                chunking: self.chunking,
                remote: self.remote,
                console: self.console,
            }),
        }
    }
}

impl<L: LogsApi, C> ChannelSelectorBuilder<L, C> {
    /// Pins the remote-log destination instead of reading it per delivery.
    pub fn log_destination(mut self, destination: LogDestination) -> Self {
        self.remote = self.remote.with_destination(destination);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_always_wins() {
        assert_eq!(DeliveryChannel::select(true, true), DeliveryChannel::NamedPipe);
        assert_eq!(DeliveryChannel::select(true, false), DeliveryChannel::NamedPipe);
    }

    #[test]
    fn test_remote_log_before_stdout() {
        assert_eq!(DeliveryChannel::select(false, true), DeliveryChannel::RemoteLog);
        assert_eq!(DeliveryChannel::select(false, false), DeliveryChannel::Stdout);
    }

    #[test]
    fn test_from_config() {
        let config = Config::builder()
            .cloudwatch_logs_api_mode(true)
            .to_cloudwatch_mode(true)
            .build();
        let selector = ChannelSelector::from_config(&config);

        assert_eq!(selector.pipe_path(), Path::new(NAMED_PIPE_PATH));
        assert!(selector.inner.remote_log_enabled);
        assert_eq!(
            selector.inner.chunking,
            ChunkPolicy::ceiling(config.cloudwatch_chunk_size)
        );
    }

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::NamedPipe {
            path: PathBuf::from("/tmp/newrelic-telemetry"),
            source: std::io::Error::other("broken pipe"),
        };
        assert_eq!(
            err.to_string(),
            "failed to write to named pipe /tmp/newrelic-telemetry"
        );
    }
}
