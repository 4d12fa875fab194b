//! Configuration loading and management.
//!
//! Configuration is layered with figment. Sources, later overriding earlier:
//! 1. Default values (compiled in)
//! 2. Config file: `/var/task/newrelic-lambda.toml` (optional)
//! 3. Environment variables with the `NEW_RELIC_` prefix
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Description |
//! |----------|--------------|-------------|
//! | `NEW_RELIC_LAMBDA_HANDLER` | `lambda_handler` | `module.function` of the wrapped handler |
//! | `NEW_RELIC_TO_CLOUDWATCH_MODE` | `to_cloudwatch_mode` | Chunk stdout output for CloudWatch |
//! | `NEW_RELIC_CLOUDWATCH_CHUNK_SIZE` | `cloudwatch_chunk_size` | Chunk ceiling in bytes |
//! | `NEW_RELIC_CLOUDWATCH_LOGS_API_MODE` | `cloudwatch_logs_api_mode` | Deliver through the CloudWatch Logs API |
//! | `NEW_RELIC_LOG_LEVEL` | `log_level` | Wrapper log verbosity |
//! | `NEW_RELIC_LOG` | `log` | `stdout` or `stderr` |
//! | `NEW_RELIC_APM_LAMBDA_MODE` | `apm_lambda_mode` | Prefix transaction names with the event type |
//!
//! Boolean flags accept `true`/`false`, `1`/`0`, `yes`/`no` and `on`/`off`.

use crate::chunking::DEFAULT_CHUNK_CEILING;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "/var/task/newrelic-lambda.toml";
const ENV_PREFIX: &str = "NEW_RELIC_";

/// Where the wrapper writes its own log lines.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output, captured by CloudWatch Logs.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

impl LogOutput {
    /// Parses a destination name. Anything other than `stderr` (a file path,
    /// say) falls back to stdout.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "stderr" => Self::Stderr,
            "stdout" | "" => Self::Stdout,
            other => {
                tracing::warn!(value = other, "Unsupported log destination, using stdout");
                Self::Stdout
            }
        }
    }
}

impl<'de> Deserialize<'de> for LogOutput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = match Scalar::deserialize(deserializer)? {
            Scalar::Str(value) => value,
            Scalar::Bool(value) => value.to_string(),
            Scalar::Int(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
        };
        Ok(Self::parse(&value))
    }
}

/// Main configuration struct for the wrapper and its telemetry pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Handler identifier, `module.function`.
    #[serde(with = "lenient_string")]
    pub lambda_handler: Option<String>,
    /// Whether stdout output is bound for a size-limited log destination.
    #[serde(with = "flag")]
    pub to_cloudwatch_mode: bool,
    /// Chunk ceiling in bytes used when `to_cloudwatch_mode` is set.
    pub cloudwatch_chunk_size: usize,
    /// Whether to deliver payloads through the CloudWatch Logs API.
    #[serde(with = "flag")]
    pub cloudwatch_logs_api_mode: bool,
    /// Wrapper log verbosity (`trace`, `debug`, `info`, `warn`, `error`).
    pub log_level: String,
    /// Whether the wrapper emits its own log lines.
    #[serde(with = "flag")]
    pub log_enabled: bool,
    /// Destination for the wrapper's own log lines.
    pub log: LogOutput,
    /// Prefix transaction names with the detected event type.
    #[serde(with = "flag")]
    pub apm_lambda_mode: bool,
    /// Agent serverless mode.
    #[serde(with = "flag")]
    pub serverless_mode_enabled: bool,
    /// Distributed tracing flag reported in the payload metadata.
    #[serde(with = "flag")]
    pub distributed_tracing_enabled: bool,
    /// Application name; defaults to the function name.
    #[serde(with = "lenient_string")]
    pub app_name: Option<String>,
    /// New Relic account id.
    #[serde(with = "lenient_string")]
    pub account_id: Option<String>,
    /// Trusted account key for distributed tracing.
    #[serde(with = "lenient_string")]
    pub trusted_account_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lambda_handler: None,
            to_cloudwatch_mode: false,
            cloudwatch_chunk_size: DEFAULT_CHUNK_CEILING,
            cloudwatch_logs_api_mode: false,
            log_level: "info".to_string(),
            log_enabled: true,
            log: LogOutput::Stdout,
            apm_lambda_mode: false,
            serverless_mode_enabled: true,
            distributed_tracing_enabled: true,
            app_name: None,
            account_id: None,
            trusted_account_key: None,
        }
    }
}

impl Config {
    /// Loads configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    #[allow(clippy::result_large_err)]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration using a custom config file path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    #[allow(clippy::result_large_err)]
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if config_path.as_ref().exists() {
            figment = figment.merge(Toml::file(config_path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX)).extract()
    }

    /// Creates a new config builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for constructing configuration programmatically.
#[must_use = "builders do nothing unless .build() is called"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new config builder with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Sets the handler identifier.
    pub fn lambda_handler(mut self, handler: impl Into<String>) -> Self {
        self.config.lambda_handler = Some(handler.into());
        self
    }

    /// Enables or disables chunked stdout output.
    pub fn to_cloudwatch_mode(mut self, enabled: bool) -> Self {
        self.config.to_cloudwatch_mode = enabled;
        self
    }

    /// Sets the chunk ceiling in bytes.
    pub fn cloudwatch_chunk_size(mut self, bytes: usize) -> Self {
        self.config.cloudwatch_chunk_size = bytes;
        self
    }

    /// Enables or disables delivery through the CloudWatch Logs API.
    pub fn cloudwatch_logs_api_mode(mut self, enabled: bool) -> Self {
        self.config.cloudwatch_logs_api_mode = enabled;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Enables or disables event-type prefixed transaction names.
    pub fn apm_lambda_mode(mut self, enabled: bool) -> Self {
        self.config.apm_lambda_mode = enabled;
        self
    }

    /// Sets the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = Some(name.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a boolean flag the way operators tend to write them.
///
/// Returns `None` for words that are neither; [`Config`] treats those as set.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Any scalar an environment variable may have been parsed into.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

mod flag {
    use super::{Scalar, parse_flag};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bool(*value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Scalar::deserialize(deserializer)? {
            Scalar::Bool(value) => Ok(value),
            Scalar::Int(value) => Ok(value != 0),
            Scalar::Float(value) => Ok(value != 0.0),
            Scalar::Str(value) => Ok(parse_flag(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Unrecognised flag value, treating as enabled");
                true
            })),
        }
    }
}

mod lenient_string {
    use super::Scalar;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_some(value),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Option::<Scalar>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(Scalar::Bool(value)) => value.to_string(),
            Some(Scalar::Int(value)) => value.to_string(),
            Some(Scalar::Float(value)) => value.to_string(),
            Some(Scalar::Str(value)) => value,
        };

        Ok(Some(value).filter(|v| !v.trim().is_empty()))
    }
}
