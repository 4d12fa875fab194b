//! Shared fixtures for the middleware integration tests.

#![allow(dead_code)]

use lambda_runtime::{Context as LambdaContext, LambdaEvent};
use newrelic_lambda_telemetry::{DeliveryError, DeliveryOutcome, EncodedPayload, TelemetrySink};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub const FUNCTION_NAME: &str = "orders";
pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:orders";

/// Sink that keeps every delivered payload.
#[derive(Clone, Default)]
pub struct RecordingSink {
    payloads: Arc<Mutex<Vec<EncodedPayload>>>,
}

impl RecordingSink {
    pub fn deliveries(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    /// Decodes every delivered payload back into its session document.
    pub fn documents(&self) -> Vec<Value> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.decode().unwrap())
            .collect()
    }

    /// Returns the single transaction event of the `n`th delivery.
    pub fn transaction_event(&self, n: usize) -> Value {
        let document = &self.documents()[n];
        let events = document["data"]["analytic_event_data"].as_array().unwrap();
        assert_eq!(events.len(), 1, "expected one transaction per delivery");
        events[0].clone()
    }
}

impl TelemetrySink for RecordingSink {
    async fn deliver(&self, payload: EncodedPayload) -> Result<DeliveryOutcome, DeliveryError> {
        self.payloads.lock().unwrap().push(payload);
        Ok(DeliveryOutcome::Stdout { envelopes: 1 })
    }
}

pub fn lambda_context(request_id: &str) -> LambdaContext {
    let mut config = lambda_runtime::Config::default();
    config.function_name = FUNCTION_NAME.to_string();
    config.version = "$LATEST".to_string();

    let mut ctx = LambdaContext::default();
    ctx.request_id = request_id.to_string();
    ctx.invoked_function_arn = FUNCTION_ARN.to_string();
    ctx.env_config = Arc::new(config);
    ctx
}

pub fn lambda_event(payload: Value, request_id: &str) -> LambdaEvent<Value> {
    LambdaEvent::new(payload, lambda_context(request_id))
}
