//! Tower Service implementation for New Relic monitoring.

use crate::cold_start::ColdStart;
use crate::extractors::event_source::extract_event_source_arn;
use crate::extractors::event_type::{EventType, detect_event_type};
use crate::extractors::http::extract_request;
use crate::future::NewRelicFuture;
use crate::layer::TransactionNaming;
use lambda_runtime::LambdaEvent;
use newrelic_lambda_telemetry::{FinalizeHook, TelemetrySink, Transaction};
use serde::Serialize;
use serde_json::Value;
use std::task::{Context, Poll};
use tower::Service;

/// Tower service that records a New Relic transaction per Lambda invocation.
///
/// This service wraps an inner service and:
/// 1. Classifies the event and builds a web or background transaction
/// 2. Records Lambda agent attributes (request id, ARN, event source)
/// 3. Invokes the inner service within a `lambda.invoke` span
/// 4. Finalizes the agent session before the result is returned
///
/// # Type Parameters
///
/// * `S` - The inner service type
/// * `K` - The telemetry sink type
#[derive(Clone)]
pub struct NewRelicService<S, K> {
    inner: S,
    hook: FinalizeHook<K>,
    cold_start: ColdStart,
    naming: TransactionNaming,
}

impl<S, K> NewRelicService<S, K> {
    /// Creates a new monitoring service wrapping the given service.
    pub(crate) fn new(
        inner: S,
        hook: FinalizeHook<K>,
        cold_start: ColdStart,
        naming: TransactionNaming,
    ) -> Self {
        Self {
            inner,
            hook,
            cold_start,
            naming,
        }
    }
}

impl<S, K> Service<LambdaEvent<Value>> for NewRelicService<S, K>
where
    S: Service<LambdaEvent<Value>>,
    S::Response: Serialize + Send + 'static,
    S::Error: std::fmt::Display + Send + 'static,
    K: TelemetrySink,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = NewRelicFuture<S::Future, S::Response, S::Error, K>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: LambdaEvent<Value>) -> Self::Future {
        let (payload, lambda_ctx) = event.into_parts();

        let event_type = detect_event_type(&payload);
        let name = self
            .naming
            .name(event_type, &lambda_ctx.env_config.function_name);

        let mut transaction = match extract_request(&payload) {
            Some(request) => Transaction::web(name, request),
            None => Transaction::background(name),
        };

        let is_cold_start = self.cold_start.check();

        record_lambda_attributes(
            &mut transaction,
            &lambda_ctx,
            &payload,
            event_type,
            is_cold_start,
        );

        if !lambda_ctx.invoked_function_arn.is_empty() {
            self.hook
                .set_lambda_metadata("arn", lambda_ctx.invoked_function_arn.as_str());
        }
        if !lambda_ctx.env_config.version.is_empty() {
            self.hook
                .set_lambda_metadata("function_version", lambda_ctx.env_config.version.as_str());
        }

        let span = tracing::info_span!(
            "lambda.invoke",
            transaction = %transaction.full_name(),
            request_id = %lambda_ctx.request_id,
            event_type = event_type.map(|t| t.name),
            cold_start = is_cold_start,
        );

        let event = LambdaEvent::new(payload, lambda_ctx);

        let future = {
            let _guard = span.enter();
            self.inner.call(event)
        };

        NewRelicFuture::new(future, span, transaction, self.hook.clone())
    }
}

/// Records the Lambda agent attributes on the transaction.
fn record_lambda_attributes(
    transaction: &mut Transaction,
    ctx: &lambda_runtime::Context,
    event: &Value,
    event_type: Option<&EventType>,
    is_cold_start: bool,
) {
    if !ctx.request_id.is_empty() {
        transaction.add_agent_attribute("aws.requestId", ctx.request_id.as_str());
    }
    if !ctx.invoked_function_arn.is_empty() {
        transaction.add_agent_attribute("aws.lambda.arn", ctx.invoked_function_arn.as_str());
    }
    if !ctx.env_config.version.is_empty() {
        transaction.add_agent_attribute(
            "aws.lambda.functionVersion",
            ctx.env_config.version.as_str(),
        );
    }

    if let Some(arn) = extract_event_source_arn(event) {
        transaction.add_agent_attribute("aws.lambda.eventSource.arn", arn);
    }

    if let Some(event_type) = event_type {
        transaction.add_agent_attribute("aws.lambda.eventSource.eventType", event_type.name);
        for (name, value) in event_type.attributes_for(event) {
            transaction.add_agent_attribute(name, value);
        }
    }

    if is_cold_start {
        transaction.add_agent_attribute("aws.lambda.coldStart", true);
    }
}
