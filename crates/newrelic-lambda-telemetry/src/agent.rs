//! Minimal agent session: transactions recorded during an invocation and the
//! session document they are finalized into.
//!
//! The session is process-wide and survives across invocations in a warm
//! container; [`AgentSession::finalize`] drains it every time.

use crate::config::Config;
use crate::encoder::{EncodeError, EncodedPayload};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Version of the payload metadata layout.
pub const METADATA_VERSION: u32 = 2;

/// Collector protocol version the session data follows.
pub const PROTOCOL_VERSION: u32 = 17;

/// Agent language reported in the metadata.
pub const AGENT_LANGUAGE: &str = "rust";

/// Request facts captured for web transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebRequest {
    /// HTTP method.
    pub method: String,
    /// Request path, without query string.
    pub path: String,
    /// Request headers, keyed by lower-cased name.
    pub headers: BTreeMap<String, String>,
}

/// Response facts captured for web transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebResponse {
    /// HTTP status code.
    pub status_code: Option<u16>,
    /// Response headers, keyed by lower-cased name.
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TransactionError {
    class: String,
    message: String,
}

/// A single handler invocation as seen by the agent.
#[derive(Debug, Clone)]
pub struct Transaction {
    name: String,
    start: SystemTime,
    duration: Option<Duration>,
    request: Option<WebRequest>,
    response: Option<WebResponse>,
    agent_attributes: Map<String, Value>,
    error: Option<TransactionError>,
}

impl Transaction {
    /// Starts a background (non-web) transaction.
    pub fn background(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: SystemTime::now(),
            duration: None,
            request: None,
            response: None,
            agent_attributes: Map::new(),
            error: None,
        }
    }

    /// Starts a web transaction for the given request.
    pub fn web(name: impl Into<String>, request: WebRequest) -> Self {
        Self {
            request: Some(request),
            ..Self::background(name)
        }
    }

    /// Returns the transaction name as given.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the metric-style name, e.g. `WebTransaction/Function/orders`.
    pub fn full_name(&self) -> String {
        let kind = if self.is_background_task() {
            "OtherTransaction"
        } else {
            "WebTransaction"
        };
        format!("{}/Function/{}", kind, self.name)
    }

    /// Returns `true` if no request was attached.
    pub fn is_background_task(&self) -> bool {
        self.request.is_none()
    }

    /// Returns the captured request, if any.
    pub fn request(&self) -> Option<&WebRequest> {
        self.request.as_ref()
    }

    /// Returns the captured response, if any.
    pub fn response(&self) -> Option<&WebResponse> {
        self.response.as_ref()
    }

    /// Adds or replaces an agent attribute.
    pub fn add_agent_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.agent_attributes.insert(key.into(), value.into());
    }

    /// Looks up an agent attribute.
    pub fn agent_attribute(&self, key: &str) -> Option<&Value> {
        self.agent_attributes.get(key)
    }

    /// Records the handler's response.
    pub fn set_response(&mut self, response: WebResponse) {
        self.response = Some(response);
    }

    /// Records a handler error.
    pub fn record_error(&mut self, class: impl Into<String>, message: impl Into<String>) {
        self.error = Some(TransactionError {
            class: class.into(),
            message: message.into(),
        });
    }

    /// Returns `true` if an error was recorded.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Stops the transaction clock. Later calls keep the first duration.
    pub fn finish(&mut self) {
        if self.duration.is_none() {
            self.duration = Some(self.start.elapsed().unwrap_or_default());
        }
    }

    fn timestamp_ms(&self) -> u64 {
        self.start
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }

    fn duration_secs(&self) -> f64 {
        self.duration
            .unwrap_or_else(|| self.start.elapsed().unwrap_or_default())
            .as_secs_f64()
    }

    fn all_agent_attributes(&self) -> Map<String, Value> {
        let mut attributes = self.agent_attributes.clone();

        if let Some(request) = &self.request {
            attributes.insert("request.method".into(), request.method.clone().into());
            attributes.insert("request.uri".into(), request.path.clone().into());
            for (header, attribute) in REQUEST_HEADER_ATTRIBUTES {
                if let Some(value) = request.headers.get(*header) {
                    attributes.insert((*attribute).into(), value.clone().into());
                }
            }
        }

        if let Some(response) = &self.response {
            if let Some(status) = response.status_code {
                attributes.insert("http.statusCode".into(), status.into());
            }
            for (header, attribute) in RESPONSE_HEADER_ATTRIBUTES {
                if let Some(value) = response.headers.get(*header) {
                    attributes.insert((*attribute).into(), value.clone().into());
                }
            }
        }

        attributes
    }

    fn into_events(mut self) -> (Value, Option<Value>) {
        self.finish();

        let name = self.full_name();
        let timestamp = self.timestamp_ms();
        let duration = self.duration_secs();
        let agent_attributes = Value::Object(self.all_agent_attributes());

        let transaction_event = json!([
            {
                "type": "Transaction",
                "name": name,
                "timestamp": timestamp,
                "duration": duration,
                "error": self.error.is_some(),
            },
            {},
            agent_attributes,
        ]);

        let error_event = self.error.map(|error| {
            json!([
                {
                    "type": "TransactionError",
                    "error.class": error.class,
                    "error.message": error.message,
                    "transactionName": name,
                    "timestamp": timestamp,
                    "duration": duration,
                },
                {},
                agent_attributes,
            ])
        });

        (transaction_event, error_event)
    }
}

const REQUEST_HEADER_ATTRIBUTES: &[(&str, &str)] = &[
    ("host", "request.headers.host"),
    ("accept", "request.headers.accept"),
    ("content-type", "request.headers.contentType"),
    ("content-length", "request.headers.contentLength"),
    ("user-agent", "request.headers.userAgent"),
    ("referer", "request.headers.referer"),
];

const RESPONSE_HEADER_ATTRIBUTES: &[(&str, &str)] = &[
    ("content-type", "response.headers.contentType"),
    ("content-length", "response.headers.contentLength"),
];

/// Buffer of finished transactions plus the metadata sent with them.
#[derive(Debug, Clone, Default)]
pub struct AgentSession {
    metadata: Map<String, Value>,
    lambda_metadata: Map<String, Value>,
    transaction_events: Vec<Value>,
    error_events: Vec<Value>,
}

impl AgentSession {
    /// Creates a session with agent metadata derived from configuration.
    pub fn new(config: &Config) -> Self {
        let mut metadata = Map::new();
        metadata.insert("protocol_version".into(), PROTOCOL_VERSION.into());
        metadata.insert("metadata_version".into(), METADATA_VERSION.into());
        metadata.insert("agent_language".into(), AGENT_LANGUAGE.into());
        metadata.insert(
            "agent_version".into(),
            env!("CARGO_PKG_VERSION").to_string().into(),
        );
        metadata.insert(
            "distributed_tracing_enabled".into(),
            config.distributed_tracing_enabled.into(),
        );
        if let Some(account_id) = &config.account_id {
            metadata.insert("account_id".into(), account_id.clone().into());
        }
        if let Some(key) = &config.trusted_account_key {
            metadata.insert("trusted_account_key".into(), key.clone().into());
        }
        let app_name = config
            .app_name
            .clone()
            .or_else(|| std::env::var("AWS_LAMBDA_FUNCTION_NAME").ok());
        if let Some(app_name) = app_name {
            metadata.insert("app_name".into(), app_name.into());
        }

        let mut session = Self {
            metadata,
            ..Self::default()
        };
        if let Ok(execution_env) = std::env::var("AWS_EXECUTION_ENV") {
            session.set_lambda_metadata("execution_environment", execution_env);
        }
        session
    }

    /// Sets an execution-environment metadata field (function ARN, version).
    ///
    /// These fields are merged into the payload metadata at finalize time and
    /// only fill keys the agent has not set itself.
    pub fn set_lambda_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.lambda_metadata.insert(key.into(), value.into());
    }

    /// Buffers a finished transaction.
    pub fn record(&mut self, transaction: Transaction) {
        let (transaction_event, error_event) = transaction.into_events();
        self.transaction_events.push(transaction_event);
        self.error_events.extend(error_event);
    }

    /// Returns the number of buffered transactions.
    pub fn pending_transactions(&self) -> usize {
        self.transaction_events.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.transaction_events.is_empty() && self.error_events.is_empty()
    }

    /// Builds the `{"metadata": ..., "data": ...}` document without draining.
    pub fn document(&self) -> Value {
        let mut metadata = self.metadata.clone();
        for (key, value) in &self.lambda_metadata {
            metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }

        json!({
            "metadata": metadata,
            "data": {
                "analytic_event_data": self.transaction_events,
                "error_event_data": self.error_events,
            },
        })
    }

    /// Encodes the buffered data and clears the buffer.
    ///
    /// The buffer is cleared even when encoding fails, so a bad invocation
    /// cannot poison the next one.
    pub fn finalize(&mut self) -> Result<EncodedPayload, EncodeError> {
        let document = self.document();
        self.transaction_events.clear();
        self.error_events.clear();
        EncodedPayload::encode(&document)
    }
}
