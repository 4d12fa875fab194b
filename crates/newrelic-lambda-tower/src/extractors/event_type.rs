//! Event-source classification.
//!
//! Each trigger delivers a characteristic JSON shape. The table below lists,
//! per event type, the key paths that must all resolve to a non-null value
//! and the attributes to record when the type matches. Entries are tried in
//! order and the first full match wins, so more specific shapes come first
//! (an ALB request also carries `httpMethod`).

use super::path::{path_get, path_match};
use serde_json::Value;

/// One entry of the event-source table.
#[derive(Debug, PartialEq, Eq)]
pub struct EventType {
    /// Event type name, e.g. `apiGateway`.
    pub name: &'static str,
    /// Key paths that must all resolve for the type to match.
    pub required_keys: &'static [&'static str],
    /// Agent attribute name and the key path its value is read from.
    pub attributes: &'static [(&'static str, &'static str)],
}

impl EventType {
    /// Returns `true` if every required key resolves in `event`.
    pub fn matches(&self, event: &Value) -> bool {
        self.required_keys.iter().all(|path| path_match(path, event))
    }

    /// Returns the attributes of this type that are present in `event`.
    pub fn attributes_for(&self, event: &Value) -> Vec<(&'static str, Value)> {
        self.attributes
            .iter()
            .filter_map(|(name, path)| path_get(path, event).map(|v| (*name, v.into_owned())))
            .collect()
    }
}

/// The event-source table, in match order.
pub static EVENT_TYPES: &[EventType] = &[
    EventType {
        name: "alb",
        required_keys: &["httpMethod", "requestContext.elb"],
        attributes: &[],
    },
    EventType {
        name: "apiGateway",
        required_keys: &[
            "headers",
            "httpMethod",
            "path",
            "requestContext",
            "requestContext.stage",
        ],
        attributes: &[
            ("aws.lambda.eventSource.accountId", "requestContext.accountId"),
            ("aws.lambda.eventSource.apiId", "requestContext.apiId"),
            ("aws.lambda.eventSource.resourceId", "requestContext.resourceId"),
            ("aws.lambda.eventSource.resourcePath", "requestContext.resourcePath"),
            ("aws.lambda.eventSource.stage", "requestContext.stage"),
        ],
    },
    EventType {
        name: "apiGatewayV2",
        required_keys: &[
            "version",
            "headers",
            "requestContext.http",
            "requestContext.http.path",
            "requestContext.http.method",
            "requestContext.stage",
        ],
        attributes: &[
            ("aws.lambda.eventSource.accountId", "requestContext.accountId"),
            ("aws.lambda.eventSource.apiId", "requestContext.apiId"),
            ("aws.lambda.eventSource.stage", "requestContext.stage"),
        ],
    },
    EventType {
        name: "cloudFront",
        required_keys: &["Records[0].cf"],
        attributes: &[],
    },
    EventType {
        name: "cloudWatch_scheduled",
        required_keys: &["detail-type", "source"],
        attributes: &[
            ("aws.lambda.eventSource.account", "account"),
            ("aws.lambda.eventSource.id", "id"),
            ("aws.lambda.eventSource.region", "region"),
            ("aws.lambda.eventSource.resource", "resources[0]"),
            ("aws.lambda.eventSource.time", "time"),
        ],
    },
    EventType {
        name: "dynamo_streams",
        required_keys: &["Records[0].dynamodb"],
        attributes: &[("aws.lambda.eventSource.length", "Records.length")],
    },
    EventType {
        name: "firehose",
        required_keys: &["deliveryStreamArn", "records[0].kinesisRecordMetadata"],
        attributes: &[
            ("aws.lambda.eventSource.length", "records.length"),
            ("aws.lambda.eventSource.region", "region"),
        ],
    },
    EventType {
        name: "kinesis",
        required_keys: &["Records[0].kinesis"],
        attributes: &[
            ("aws.lambda.eventSource.length", "Records.length"),
            ("aws.lambda.eventSource.region", "Records[0].awsRegion"),
        ],
    },
    EventType {
        name: "s3",
        required_keys: &["Records[0].s3"],
        attributes: &[
            ("aws.lambda.eventSource.bucketName", "Records[0].s3.bucket.name"),
            ("aws.lambda.eventSource.eventName", "Records[0].eventName"),
            ("aws.lambda.eventSource.eventTime", "Records[0].eventTime"),
            ("aws.lambda.eventSource.length", "Records.length"),
            ("aws.lambda.eventSource.objectKey", "Records[0].s3.object.key"),
            ("aws.lambda.eventSource.objectSequencer", "Records[0].s3.object.sequencer"),
            ("aws.lambda.eventSource.objectSize", "Records[0].s3.object.size"),
            ("aws.lambda.eventSource.region", "Records[0].awsRegion"),
            ("aws.lambda.eventSource.xAmzId2", "Records[0].responseElements.x-amz-id-2"),
        ],
    },
    EventType {
        name: "ses",
        required_keys: &["Records[0].ses"],
        attributes: &[
            ("aws.lambda.eventSource.date", "Records[0].ses.mail.commonHeaders.date"),
            ("aws.lambda.eventSource.length", "Records.length"),
            ("aws.lambda.eventSource.messageId", "Records[0].ses.mail.commonHeaders.messageId"),
            ("aws.lambda.eventSource.returnPath", "Records[0].ses.mail.commonHeaders.returnPath"),
        ],
    },
    EventType {
        name: "sns",
        required_keys: &["Records[0].Sns"],
        attributes: &[
            ("aws.lambda.eventSource.length", "Records.length"),
            ("aws.lambda.eventSource.messageId", "Records[0].Sns.MessageId"),
            ("aws.lambda.eventSource.timestamp", "Records[0].Sns.Timestamp"),
            ("aws.lambda.eventSource.topicArn", "Records[0].Sns.TopicArn"),
            ("aws.lambda.eventSource.type", "Records[0].Sns.Type"),
        ],
    },
    EventType {
        name: "sqs",
        required_keys: &["Records[0].receiptHandle"],
        attributes: &[("aws.lambda.eventSource.length", "Records.length")],
    },
];

/// Classifies `event` against [`EVENT_TYPES`].
///
/// Only JSON objects are classified; anything else yields `None`.
pub fn detect_event_type(event: &Value) -> Option<&'static EventType> {
    if !event.is_object() {
        return None;
    }
    EVENT_TYPES.iter().find(|event_type| event_type.matches(event))
}
