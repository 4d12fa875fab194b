//! Request and response facts for web transactions.
//!
//! Two request shapes are recognised:
//! - REST API (v1) and ALB events carry `httpMethod` and `path` at the top
//!   level;
//! - HTTP API (v2) events carry them under `requestContext.http`.
//!
//! Anything else is a background invocation.

use newrelic_lambda_telemetry::{Transaction, WebRequest, WebResponse};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Extracts the HTTP request carried by `event`, if any.
///
/// Header names are lower-cased. Multi-value headers are joined with `", "`
/// and only used when the event has no `headers` key at all.
pub fn extract_request(event: &Value) -> Option<WebRequest> {
    let (method, path) = match event.get("httpMethod") {
        Some(method) => (method, event.get("path")?),
        None => {
            let http = event.get("requestContext")?.get("http")?;
            (http.get("method")?, http.get("path")?)
        }
    };

    let headers = match event.get("headers") {
        Some(headers) => headers.as_object().map(single_value_headers),
        None => event
            .get("multiValueHeaders")
            .and_then(Value::as_object)
            .map(multi_value_headers),
    };

    Some(WebRequest {
        method: method.as_str()?.to_string(),
        path: path.as_str()?.to_string(),
        headers: headers.unwrap_or_default(),
    })
}

/// Records the status code and headers of a handler response.
///
/// `statusCode` may be a number or a numeric string. Responses that are not
/// JSON objects are ignored.
pub fn process_response(transaction: &mut Transaction, response: &Value) {
    let Some(response) = response.as_object() else {
        return;
    };

    let status_code = match response.get("statusCode") {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    let headers = response
        .get("headers")
        .and_then(Value::as_object)
        .map(single_value_headers)
        .unwrap_or_default();

    transaction.set_response(WebResponse {
        status_code,
        headers,
    });
}

fn single_value_headers(headers: &Map<String, Value>) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.to_ascii_lowercase(), header_value(value)?)))
        .collect()
}

fn multi_value_headers(headers: &Map<String, Value>) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, values)| {
            let joined = values
                .as_array()?
                .iter()
                .filter_map(header_value)
                .collect::<Vec<_>>()
                .join(", ");
            Some((name.to_ascii_lowercase(), joined))
        })
        .collect()
}

fn header_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
