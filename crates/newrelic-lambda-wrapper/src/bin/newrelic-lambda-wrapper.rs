//! Lambda bootstrap binary with New Relic monitoring.
//!
//! Set `NEW_RELIC_LAMBDA_HANDLER` to one of the registered handlers:
//! - `orders.handler` - API Gateway style order lookup
//! - `queue.handler` - SQS batch consumer
//!
//! Environment variables:
//! - `AWS_LAMBDA_RUNTIME_API` - Required, set by the Lambda service
//! - `NEW_RELIC_*` - Wrapper configuration, see the telemetry crate docs

use anyhow::Context;
use lambda_runtime::LambdaEvent;
use newrelic_lambda_wrapper::{HandlerRegistry, run};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct SqsRecord {
    #[serde(rename = "messageId")]
    message_id: String,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct SqsBatch {
    #[serde(rename = "Records", default)]
    records: Vec<SqsRecord>,
}

async fn orders(event: LambdaEvent<Value>) -> Result<Value, lambda_runtime::Error> {
    let (payload, context) = event.into_parts();

    let order_id = payload
        .get("pathParameters")
        .and_then(|params| params.get("id"))
        .and_then(Value::as_str);

    tracing::info!(request_id = %context.request_id, ?order_id, "Looking up order");

    let (status, body) = match order_id {
        Some(id) => (200, json!({"id": id, "status": "shipped"})),
        None => (400, json!({"error": "missing order id"})),
    };

    Ok(json!({
        "statusCode": status,
        "headers": {"content-type": "application/json"},
        "body": body.to_string(),
    }))
}

async fn queue(event: LambdaEvent<Value>) -> Result<Value, lambda_runtime::Error> {
    let batch: SqsBatch = serde_json::from_value(event.payload)?;

    for record in &batch.records {
        tracing::info!(
            message_id = %record.message_id,
            bytes = record.body.len(),
            "Processing SQS message"
        );
    }

    Ok(json!({"batchItemFailures": []}))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let registry = HandlerRegistry::new()
        .register("orders", "handler", orders)
        .register("queue", "handler", queue);

    run(registry)
        .await
        .context("New Relic Lambda wrapper failed")
}
