//! Event-source ARN extraction.

use super::path::path_get;
use serde_json::Value;

/// Longest ARN recorded, in characters.
pub const MAX_ARN_LENGTH: usize = 255;

/// Returns the ARN of the resource that triggered the invocation.
///
/// Locations are tried in order: Firehose stream ARNs at the top level, the
/// first record's source ARN (DynamoDB, Kinesis, SQS), SNS subscription or
/// S3 bucket, the ALB target group, and finally the first CloudWatch Events
/// resource. Empty values are skipped. The result is truncated to
/// [`MAX_ARN_LENGTH`] characters.
pub fn extract_event_source_arn(event: &Value) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "streamArn",
        "deliveryStreamArn",
        "Records[0].eventSourceARN",
        "Records[0].EventSubscriptionArn",
        "Records[0].s3.bucket.arn",
        "requestContext.elb.targetGroupArn",
        "resources[0]",
    ];

    let arn = CANDIDATES
        .iter()
        .filter_map(|path| path_get(path, event))
        .find_map(|value| match &*value {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(false) => None,
            other => Some(other.to_string()),
        })?;

    Some(truncate(arn, MAX_ARN_LENGTH))
}

fn truncate(mut s: String, max_chars: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
    }
    s
}
