//! Data extraction from backend response envelopes.
//!
//! The backend is not consistent about where it puts things: request lists
//! come back bare or wrapped, and error bodies carry their message under one
//! of several keys. Everything here is tolerant and never panics on odd input.

use serde_json::Value;
use thiserror::Error;

use crate::payloads::{AuthResponse, BackendRequest};

/// Extraction errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Parse the body of a successful login/registration call.
pub fn parse_auth_response(body: &Value) -> ExtractionResult<AuthResponse> {
    if !body.is_object() {
        return Err(ExtractionError::InvalidFormat(
            "Auth response is not a JSON object".into(),
        ));
    }

    let response: AuthResponse = serde_json::from_value(body.clone())?;
    if response.tokens.access.token.is_empty() {
        return Err(ExtractionError::InvalidFormat(
            "Auth response has an empty access token".into(),
        ));
    }

    Ok(response)
}

/// Normalize a request-list envelope into backend records.
///
/// Accepted shapes, in order: a bare array, `{ data: { requests: [...] } }`,
/// `{ data: [...] }`, `{ requests: [...] }`. Anything else yields an empty
/// list. Array entries that are not request objects are skipped.
pub fn extract_request_list(body: &Value) -> Vec<BackendRequest> {
    let Some(items) = request_array(body) else {
        return Vec::new();
    };

    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

fn request_array(body: &Value) -> Option<&Vec<Value>> {
    if let Some(items) = body.as_array() {
        return Some(items);
    }

    let data = body.get("data");
    data.and_then(|d| d.get("requests"))
        .and_then(Value::as_array)
        .or_else(|| data.and_then(Value::as_array))
        .or_else(|| body.get("requests").and_then(Value::as_array))
}

/// Pull a human-readable message out of an error response body.
///
/// Precedence: string body, `message`, `error`, first entry of an `errors`
/// array (the entry itself or its `message`), first value of an `errors`
/// object. Empty strings count as absent.
pub fn extract_server_message(body: &Value) -> Option<String> {
    match body {
        Value::String(s) => non_empty(s),
        Value::Object(map) => map
            .get("message")
            .and_then(string_value)
            .or_else(|| map.get("error").and_then(string_value))
            .or_else(|| map.get("errors").and_then(first_error)),
        _ => None,
    }
}

fn first_error(errors: &Value) -> Option<String> {
    match errors {
        Value::Array(items) => items.first().and_then(|first| match first {
            Value::String(s) => non_empty(s),
            other => other.get("message").and_then(string_value),
        }),
        Value::Object(map) => map.values().next().and_then(string_value),
        _ => None,
    }
}

fn string_value(value: &Value) -> Option<String> {
    value.as_str().and_then(non_empty)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_record(id: &str) -> Value {
        json!({
            "_id": id,
            "name": "Jane Doe",
            "serviceType": "medical",
            "location": "12 Elm St",
            "time": "2025-03-10T09:30:00.000Z",
            "status": "pending"
        })
    }

    #[test]
    fn test_bare_array() {
        let body = json!([sample_record("r1"), sample_record("r2")]);
        let records = extract_request_list(&body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_nested_data_requests() {
        let body = json!({"data": {"requests": [sample_record("r1")]}});
        assert_eq!(extract_request_list(&body).len(), 1);
    }

    #[test]
    fn test_data_array() {
        let body = json!({"data": [sample_record("r1")]});
        assert_eq!(extract_request_list(&body).len(), 1);
    }

    #[test]
    fn test_top_level_requests() {
        let body = json!({"success": true, "requests": [sample_record("r1")]});
        assert_eq!(extract_request_list(&body).len(), 1);
    }

    #[test]
    fn test_unrecognized_shape_is_empty() {
        assert!(extract_request_list(&json!({"data": {"total": 3}})).is_empty());
        assert!(extract_request_list(&json!("nope")).is_empty());
        assert!(extract_request_list(&Value::Null).is_empty());
    }

    #[test]
    fn test_non_object_entries_skipped() {
        let body = json!([sample_record("r1"), 42, "x", null]);
        assert_eq!(extract_request_list(&body).len(), 1);
    }

    #[test]
    fn test_message_precedence() {
        assert_eq!(
            extract_server_message(&json!("plain text")),
            Some("plain text".into())
        );
        assert_eq!(
            extract_server_message(&json!({"message": "not found", "error": "x"})),
            Some("not found".into())
        );
        assert_eq!(
            extract_server_message(&json!({"message": "", "error": "Bad email"})),
            Some("Bad email".into())
        );
        assert_eq!(
            extract_server_message(&json!({"errors": [{"message": "name required"}]})),
            Some("name required".into())
        );
        assert_eq!(
            extract_server_message(&json!({"errors": ["time required"]})),
            Some("time required".into())
        );
        assert_eq!(
            extract_server_message(&json!({"errors": {"location": "location required", "name": "x"}})),
            Some("location required".into())
        );
    }

    #[test]
    fn test_no_message() {
        assert_eq!(extract_server_message(&Value::Null), None);
        assert_eq!(extract_server_message(&json!("")), None);
        assert_eq!(extract_server_message(&json!({"code": 17})), None);
        assert_eq!(extract_server_message(&json!({"errors": []})), None);
    }

    #[test]
    fn test_parse_auth_response() {
        let body = json!({
            "user": {"_id": "u1", "fullName": "Jane Doe", "email": "jane@example.com"},
            "tokens": {
                "access": {"token": "abc", "expires": "2025-03-11T00:00:00.000Z"},
                "refresh": {"token": "def", "expires": "2025-04-10T00:00:00.000Z"}
            }
        });

        let auth = parse_auth_response(&body).unwrap();
        assert_eq!(auth.tokens.access.token, "abc");
        assert_eq!(auth.user.id, "u1");
    }

    #[test]
    fn test_parse_auth_response_rejects_missing_token() {
        let body = json!({"user": {"_id": "u1"}, "tokens": {"access": {"token": ""}}});
        assert!(matches!(
            parse_auth_response(&body),
            Err(ExtractionError::InvalidFormat(_))
        ));

        let body = json!({"user": {"_id": "u1"}});
        assert!(matches!(
            parse_auth_response(&body),
            Err(ExtractionError::JsonParse(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_string_body_is_its_own_message(s in "[a-zA-Z0-9 .,!]{1,40}") {
            prop_assert_eq!(extract_server_message(&json!(s.clone())), Some(s));
        }

        #[test]
        fn prop_wrapped_lists_agree(count in 0usize..6) {
            let records: Vec<Value> = (0..count).map(|i| sample_record(&format!("r{}", i))).collect();
            let bare = extract_request_list(&json!(records.clone()));
            let wrapped = extract_request_list(&json!({"data": {"requests": records}}));
            prop_assert_eq!(bare.len(), count);
            prop_assert_eq!(bare, wrapped);
        }
    }
}
