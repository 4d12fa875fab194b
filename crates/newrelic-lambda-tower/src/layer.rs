//! Tower Layer implementation for New Relic monitoring.

use crate::cold_start::ColdStart;
use crate::extractors::event_type::EventType;
use crate::service::NewRelicService;
use newrelic_lambda_telemetry::{AgentSession, Config, FinalizeHook, TelemetrySink};
use tower::Layer;

/// Tower layer that adds New Relic monitoring to Lambda handlers.
///
/// This layer wraps a service with instrumentation that:
/// - Classifies the event and extracts request metadata
/// - Records a transaction with Lambda agent attributes
/// - Handles cold start detection
/// - Finalizes the agent session into the sink after each invocation
///
/// # Type Parameters
///
/// * `K` - The telemetry sink finalized payloads are delivered to
///
/// # Example
///
/// ```ignore
/// use newrelic_lambda_telemetry::{ChannelSelector, Config};
/// use newrelic_lambda_tower::NewRelicLayer;
/// use tower::ServiceBuilder;
///
/// let config = Config::load()?;
/// let layer = NewRelicLayer::builder(ChannelSelector::from_config(&config))
///     .config(&config)
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(my_handler);
/// ```
#[derive(Clone)]
pub struct NewRelicLayer<K> {
    hook: FinalizeHook<K>,
    cold_start: ColdStart,
    naming: TransactionNaming,
}

impl<K: TelemetrySink> NewRelicLayer<K> {
    /// Creates a layer with default configuration delivering to `sink`.
    pub fn new(sink: K) -> Self {
        Self::builder(sink).build()
    }

    /// Creates a builder for more detailed configuration.
    pub fn builder(sink: K) -> NewRelicLayerBuilder<K> {
        NewRelicLayerBuilder::new(sink)
    }

    /// Returns the finalize hook shared by every service this layer produces.
    pub fn hook(&self) -> &FinalizeHook<K> {
        &self.hook
    }

    /// Returns the cold-start state shared by every service this layer produces.
    pub fn cold_start(&self) -> &ColdStart {
        &self.cold_start
    }
}

impl<S, K> Layer<S> for NewRelicLayer<K>
where
    K: Clone,
{
    type Service = NewRelicService<S, K>;

    fn layer(&self, inner: S) -> Self::Service {
        NewRelicService::new(
            inner,
            self.hook.clone(),
            self.cold_start.clone(),
            self.naming.clone(),
        )
    }
}

/// How transactions are named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TransactionNaming {
    apm_lambda_mode: bool,
    fixed: Option<String>,
}

impl TransactionNaming {
    /// Picks the transaction name for one invocation.
    ///
    /// APM Lambda mode takes precedence and yields `"<EVENTTYPE> <function>"`,
    /// or just the function name for unclassified events.
    pub(crate) fn name(&self, event_type: Option<&EventType>, function_name: &str) -> String {
        if self.apm_lambda_mode {
            return match event_type {
                Some(event_type) => {
                    format!("{} {}", event_type.name.to_uppercase(), function_name)
                }
                None => function_name.to_string(),
            };
        }

        self.fixed
            .clone()
            .unwrap_or_else(|| function_name.to_string())
    }
}

/// Builder for configuring a [`NewRelicLayer`].
#[must_use = "builders do nothing unless .build() is called"]
pub struct NewRelicLayerBuilder<K> {
    sink: K,
    session: Option<AgentSession>,
    cold_start: ColdStart,
    naming: TransactionNaming,
}

impl<K: TelemetrySink> NewRelicLayerBuilder<K> {
    /// Creates a new builder delivering to `sink`.
    pub fn new(sink: K) -> Self {
        Self {
            sink,
            session: None,
            cold_start: ColdStart::new(),
            naming: TransactionNaming::default(),
        }
    }

    /// Applies configuration: agent metadata and APM Lambda mode.
    pub fn config(mut self, config: &Config) -> Self {
        self.session = Some(AgentSession::new(config));
        self.naming.apm_lambda_mode = config.apm_lambda_mode;
        self
    }

    /// Sets the agent session explicitly.
    pub fn session(mut self, session: AgentSession) -> Self {
        self.session = Some(session);
        self
    }

    /// Shares an existing cold-start state.
    pub fn cold_start(mut self, cold_start: ColdStart) -> Self {
        self.cold_start = cold_start;
        self
    }

    /// Prefixes transaction names with the upper-cased event type.
    ///
    /// Default: `false`
    pub fn apm_lambda_mode(mut self, enabled: bool) -> Self {
        self.naming.apm_lambda_mode = enabled;
        self
    }

    /// Uses a fixed transaction name instead of the function name.
    ///
    /// Ignored in APM Lambda mode.
    pub fn transaction_name(mut self, name: impl Into<String>) -> Self {
        self.naming.fixed = Some(name.into());
        self
    }

    /// Builds the configured layer.
    pub fn build(self) -> NewRelicLayer<K> {
        let session = self
            .session
            .unwrap_or_else(|| AgentSession::new(&Config::default()));

        NewRelicLayer {
            hook: FinalizeHook::new(session, self.sink),
            cold_start: self.cold_start,
            naming: self.naming,
        }
    }
}
