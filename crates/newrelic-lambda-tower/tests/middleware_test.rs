//! Integration tests for the Tower middleware (Layer/Service).
//!
//! These tests verify that the NewRelicLayer correctly:
//! - Wraps services and forwards responses and errors unchanged
//! - Finalizes exactly once per invocation, error path included
//! - Classifies web and background invocations
//! - Reports cold start on the first invocation only

mod common;

use aws_lambda_events::apigw::ApiGatewayProxyResponse;
use common::{FUNCTION_ARN, RecordingSink, lambda_event};
use lambda_runtime::{LambdaEvent, service_fn};
use newrelic_lambda_telemetry::{AgentSession, Config};
use newrelic_lambda_tower::{ColdStart, NewRelicLayer};
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

#[derive(Clone)]
struct MockHandler {
    call_count: Arc<AtomicUsize>,
    should_error: bool,
    response: Value,
}

impl MockHandler {
    fn new() -> Self {
        Self::responding(json!({"statusCode": 200, "body": "ok"}))
    }

    fn responding(response: Value) -> Self {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
            should_error: false,
            response,
        }
    }

    fn with_error() -> Self {
        Self {
            should_error: true,
            ..Self::new()
        }
    }

    fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Service<LambdaEvent<Value>> for MockHandler {
    type Response = Value;
    type Error = MockError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: LambdaEvent<Value>) -> Self::Future {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let should_error = self.should_error;
        let response = self.response.clone();

        Box::pin(async move {
            if should_error {
                Err(MockError("Handler error".to_string()))
            } else {
                Ok(response)
            }
        })
    }
}

#[derive(Debug)]
struct MockError(String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MockError {}

fn rest_api_event() -> Value {
    json!({
        "resource": "/dev",
        "path": "/dev",
        "httpMethod": "GET",
        "headers": {"Host": "abc123.execute-api.us-east-1.amazonaws.com", "User-Agent": "curl/8.0"},
        "requestContext": {"stage": "dev", "apiId": "abc123", "accountId": "123456789012"},
        "body": null,
    })
}

fn sqs_event() -> Value {
    json!({
        "Records": [{
            "messageId": "059f36b4-87a3-44ab-83d2-661975830a7d",
            "receiptHandle": "AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a",
            "body": "Hello from SQS!",
            "eventSource": "aws:sqs",
            "eventSourceARN": "arn:aws:sqs:us-east-1:123456789012:MyQueue",
            "awsRegion": "us-east-1"
        }]
    })
}

#[tokio::test]
async fn test_layer_forwards_response() {
    let handler = MockHandler::new();
    let layer = NewRelicLayer::new(RecordingSink::default());

    let mut service = layer.layer(handler.clone());
    let result = service
        .ready()
        .await
        .unwrap()
        .call(lambda_event(rest_api_event(), "req-1"))
        .await
        .unwrap();

    assert_eq!(result, json!({"statusCode": 200, "body": "ok"}));
    assert_eq!(handler.call_count(), 1);
}

#[tokio::test]
async fn test_layer_forwards_error_and_still_finalizes() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());

    let mut service = layer.layer(MockHandler::with_error());
    let result = service
        .ready()
        .await
        .unwrap()
        .call(lambda_event(sqs_event(), "req-1"))
        .await;

    assert_eq!(result.unwrap_err().to_string(), "Handler error");
    assert_eq!(sink.deliveries(), 1);

    let document = &sink.documents()[0];
    let errors = document["data"]["error_event_data"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0][0]["error.message"], "Handler error");
    assert_eq!(errors[0][0]["error.class"], "MockError");
    assert_eq!(sink.transaction_event(0)[0]["error"], true);
}

async fn panicking_handler(_event: LambdaEvent<Value>) -> Result<Value, lambda_runtime::Error> {
    panic!("order lookup exploded")
}

async fn boxed_error_handler(_event: LambdaEvent<Value>) -> Result<Value, lambda_runtime::Error> {
    Err("order service unavailable".into())
}

#[tokio::test]
async fn test_handler_panic_is_finalized_then_resumed() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());
    let service = layer.layer(service_fn(panicking_handler));

    let join = tokio::spawn(service.oneshot(lambda_event(sqs_event(), "req-panic"))).await;

    assert!(join.unwrap_err().is_panic());
    assert_eq!(sink.deliveries(), 1);
    assert_eq!(layer.hook().pending_transactions(), 0);

    let document = &sink.documents()[0];
    let errors = document["data"]["error_event_data"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0][0]["error.class"], "panic");
    assert_eq!(errors[0][0]["error.message"], "order lookup exploded");
    assert_eq!(errors[0][2]["aws.requestId"], "req-panic");
}

#[tokio::test]
async fn test_service_usable_after_handler_panic() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());

    let panicked = tokio::spawn(
        layer
            .layer(service_fn(panicking_handler))
            .oneshot(lambda_event(sqs_event(), "req-1")),
    )
    .await;
    assert!(panicked.is_err());

    let result = layer
        .layer(MockHandler::new())
        .oneshot(lambda_event(sqs_event(), "req-2"))
        .await;

    assert!(result.is_ok());
    assert_eq!(sink.deliveries(), 2);
    assert_eq!(sink.transaction_event(1)[2]["aws.requestId"], "req-2");
}

#[tokio::test]
async fn test_boxed_error_reports_short_class() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());

    let result = layer
        .layer(service_fn(boxed_error_handler))
        .oneshot(lambda_event(sqs_event(), "req-1"))
        .await;

    assert_eq!(result.unwrap_err().to_string(), "order service unavailable");
    let document = &sink.documents()[0];
    let errors = document["data"]["error_event_data"].as_array().unwrap();
    assert_eq!(errors[0][0]["error.class"], "Error");
}

#[tokio::test]
async fn test_one_finalize_per_invocation() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());
    let mut service = layer.layer(MockHandler::new());

    for i in 0..3 {
        let event = lambda_event(sqs_event(), &format!("req-{i}"));
        service.ready().await.unwrap().call(event).await.unwrap();
        assert_eq!(layer.hook().pending_transactions(), 0);
    }

    assert_eq!(sink.deliveries(), 3);
    for i in 0..3 {
        assert_eq!(
            sink.transaction_event(i)[2]["aws.requestId"],
            format!("req-{i}")
        );
    }
}

#[tokio::test]
async fn test_cold_start_only_on_first_invocation() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());
    let mut service = layer.layer(MockHandler::new());

    for i in 0..2 {
        let event = lambda_event(sqs_event(), &format!("req-{i}"));
        service.ready().await.unwrap().call(event).await.unwrap();
    }

    assert_eq!(sink.transaction_event(0)[2]["aws.lambda.coldStart"], true);
    assert!(sink.transaction_event(1)[2].get("aws.lambda.coldStart").is_none());
}

#[tokio::test]
async fn test_cold_start_shared_between_layers() {
    let cold_start = ColdStart::new();
    let first = NewRelicLayer::builder(RecordingSink::default())
        .cold_start(cold_start.clone())
        .build();
    let second_sink = RecordingSink::default();
    let second = NewRelicLayer::builder(second_sink.clone())
        .cold_start(cold_start.clone())
        .build();

    first
        .layer(MockHandler::new())
        .oneshot(lambda_event(sqs_event(), "req-1"))
        .await
        .unwrap();
    second
        .layer(MockHandler::new())
        .oneshot(lambda_event(sqs_event(), "req-2"))
        .await
        .unwrap();

    assert!(!cold_start.is_pending());
    assert!(
        second_sink.transaction_event(0)[2]
            .get("aws.lambda.coldStart")
            .is_none()
    );
}

#[tokio::test]
async fn test_rest_api_event_is_web_transaction() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());

    layer
        .layer(MockHandler::new())
        .oneshot(lambda_event(rest_api_event(), "req-1"))
        .await
        .unwrap();

    let event = sink.transaction_event(0);
    assert_eq!(event[0]["name"], "WebTransaction/Function/orders");

    let attributes = &event[2];
    assert_eq!(attributes["request.method"], "GET");
    assert_eq!(attributes["request.uri"], "/dev");
    assert_eq!(
        attributes["request.headers.host"],
        "abc123.execute-api.us-east-1.amazonaws.com"
    );
    assert_eq!(attributes["http.statusCode"], 200);
    assert_eq!(attributes["aws.lambda.eventSource.eventType"], "apiGateway");
    assert_eq!(attributes["aws.lambda.eventSource.apiId"], "abc123");
    assert_eq!(attributes["aws.lambda.eventSource.stage"], "dev");
    assert_eq!(attributes["aws.lambda.arn"], FUNCTION_ARN);
    assert_eq!(attributes["aws.lambda.functionVersion"], "$LATEST");
}

#[tokio::test]
async fn test_sqs_event_is_background_transaction() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());

    layer
        .layer(MockHandler::new())
        .oneshot(lambda_event(sqs_event(), "req-1"))
        .await
        .unwrap();

    let event = sink.transaction_event(0);
    assert_eq!(event[0]["name"], "OtherTransaction/Function/orders");

    let attributes = &event[2];
    assert!(attributes.get("request.method").is_none());
    assert!(attributes.get("http.statusCode").is_none());
    assert_eq!(attributes["aws.lambda.eventSource.eventType"], "sqs");
    assert_eq!(
        attributes["aws.lambda.eventSource.arn"],
        "arn:aws:sqs:us-east-1:123456789012:MyQueue"
    );
    assert_eq!(attributes["aws.lambda.eventSource.length"], 1);
}

#[tokio::test]
async fn test_malformed_events_are_background_without_error() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());
    let mut service = layer.layer(MockHandler::new());

    let events = [
        json!("not an object"),
        json!({"httpMethod": 5}),
        json!({"requestContext": {"http": "GET"}}),
        json!(null),
    ];
    for (i, payload) in events.into_iter().enumerate() {
        let event = lambda_event(payload, &format!("req-{i}"));
        assert!(service.ready().await.unwrap().call(event).await.is_ok());
    }

    assert_eq!(sink.deliveries(), 4);
    for i in 0..4 {
        let event = sink.transaction_event(i);
        assert_eq!(event[0]["name"], "OtherTransaction/Function/orders");
        assert_eq!(event[0]["error"], false);
        assert!(event[2].get("request.method").is_none());
    }
}

#[tokio::test]
async fn test_apm_lambda_mode_prefixes_event_type() {
    let sink = RecordingSink::default();
    let config = Config::builder().apm_lambda_mode(true).build();
    let layer = NewRelicLayer::builder(sink.clone())
        .config(&config)
        .build();

    layer
        .layer(MockHandler::new())
        .oneshot(lambda_event(rest_api_event(), "req-1"))
        .await
        .unwrap();

    assert_eq!(
        sink.transaction_event(0)[0]["name"],
        "WebTransaction/Function/APIGATEWAY orders"
    );
}

#[tokio::test]
async fn test_fixed_transaction_name() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::builder(sink.clone())
        .transaction_name("checkout")
        .build();

    layer
        .layer(MockHandler::new())
        .oneshot(lambda_event(sqs_event(), "req-1"))
        .await
        .unwrap();

    assert_eq!(
        sink.transaction_event(0)[0]["name"],
        "OtherTransaction/Function/checkout"
    );
}

#[tokio::test]
async fn test_lambda_metadata_in_payload() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::builder(sink.clone())
        .session(AgentSession::new(&Config::default()))
        .build();

    layer
        .layer(MockHandler::new())
        .oneshot(lambda_event(sqs_event(), "req-1"))
        .await
        .unwrap();

    let document = &sink.documents()[0];
    assert_eq!(document["metadata"]["arn"], FUNCTION_ARN);
    assert_eq!(document["metadata"]["function_version"], "$LATEST");
    assert_eq!(document["metadata"]["agent_language"], "rust");
}

#[tokio::test]
async fn test_typed_response_status_recorded() {
    let sink = RecordingSink::default();
    let layer = NewRelicLayer::new(sink.clone());

    let handler = tower::service_fn(|_event: LambdaEvent<Value>| async {
        let mut response = ApiGatewayProxyResponse::default();
        response.status_code = 201;
        Ok::<_, std::convert::Infallible>(response)
    });

    let response = layer
        .layer(handler)
        .oneshot(lambda_event(rest_api_event(), "req-1"))
        .await
        .unwrap();

    assert_eq!(response.status_code, 201);
    assert_eq!(sink.transaction_event(0)[2]["http.statusCode"], 201);
}

#[tokio::test]
async fn test_service_is_clone() {
    let sink = RecordingSink::default();
    let handler = MockHandler::new();
    let layer = NewRelicLayer::new(sink.clone());

    let service = layer.layer(handler.clone());
    let mut service_clone = service.clone();

    service_clone
        .ready()
        .await
        .unwrap()
        .call(lambda_event(sqs_event(), "req-1"))
        .await
        .unwrap();

    assert_eq!(handler.call_count(), 1);
    assert_eq!(sink.deliveries(), 1);
}
