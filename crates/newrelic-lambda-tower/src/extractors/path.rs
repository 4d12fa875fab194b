//! Key-path lookup into JSON events.
//!
//! Paths use the familiar `a.b[0].c` notation. Segments are split on `.` and
//! `[`, a trailing `]` is dropped, numeric segments index arrays, and the
//! segment `length` yields the length of whatever has been reached so far.

use serde_json::Value;
use std::borrow::Cow;

/// Resolves `path` against `value`.
///
/// Returns `None` if any segment is missing or the resolved value is `null`.
/// A `length` segment ends the lookup with an owned number.
///
/// # Example
///
/// ```
/// use newrelic_lambda_tower::extractors::path::path_get;
/// use serde_json::json;
///
/// let event = json!({"Records": [{"s3": {"bucket": {"name": "uploads"}}}]});
///
/// assert_eq!(path_get("Records[0].s3.bucket.name", &event).as_deref(), Some(&json!("uploads")));
/// assert_eq!(path_get("Records.length", &event).as_deref(), Some(&json!(1)));
/// assert!(path_get("Records[1]", &event).is_none());
/// ```
pub fn path_get<'a>(path: &str, value: &'a Value) -> Option<Cow<'a, Value>> {
    let mut current = value;

    for segment in path.split(['.', '[']) {
        let segment = segment.trim_end_matches(']');

        if segment == "length" {
            let len = match current {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::String(s) => s.chars().count(),
                _ => return None,
            };
            return Some(Cow::Owned(Value::from(len)));
        }

        current = match current {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }

    (!current.is_null()).then_some(Cow::Borrowed(current))
}

/// Returns `true` if `path` resolves to a non-null value.
pub fn path_match(path: &str, value: &Value) -> bool {
    path_get(path, value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_nested_object_and_array() {
        let event = json!({"a": {"b": [{"c": "x"}, {"c": "y"}]}});

        assert_eq!(path_get("a.b[1].c", &event).as_deref(), Some(&json!("y")));
        assert_eq!(path_get("a.b[0]", &event).as_deref(), Some(&json!({"c": "x"})));
    }

    #[test]
    fn test_missing_segments() {
        let event = json!({"a": {"b": [1]}});

        assert!(path_get("a.c", &event).is_none());
        assert!(path_get("a.b[5]", &event).is_none());
        assert!(path_get("a.b.x", &event).is_none());
        assert!(path_get("a.b[0].deeper", &event).is_none());
    }

    #[test]
    fn test_null_is_no_match() {
        let event = json!({"requestContext": {"elb": null}});

        assert!(!path_match("requestContext.elb", &event));
        assert!(path_match("requestContext", &event));
    }

    #[test]
    fn test_length_segment() {
        let event = json!({
            "Records": [1, 2, 3],
            "detail": {"a": 1, "b": 2},
            "name": "héllo",
        });

        assert_eq!(path_get("Records.length", &event).as_deref(), Some(&json!(3)));
        assert_eq!(path_get("detail.length", &event).as_deref(), Some(&json!(2)));
        assert_eq!(path_get("name.length", &event).as_deref(), Some(&json!(5)));
    }

    #[test]
    fn test_hyphenated_keys() {
        let event = json!({"Records": [{"responseElements": {"x-amz-id-2": "abc"}}]});

        assert_eq!(
            path_get("Records[0].responseElements.x-amz-id-2", &event).as_deref(),
            Some(&json!("abc"))
        );
    }

    #[test]
    fn test_non_container_root() {
        assert!(path_get("a", &json!("string")).is_none());
        assert!(path_get("a", &json!(null)).is_none());
    }

    proptest! {
        #[test]
        fn path_get_never_panics(path in "[a-zA-Z0-9.\\[\\]-]{0,24}") {
            let event = json!({
                "Records": [{"s3": {"bucket": {"name": "b"}}, "eventSourceARN": "arn"}],
                "requestContext": {"http": {"method": "GET"}},
                "length": 7,
            });
            let _ = path_get(&path, &event);
        }
    }
}
