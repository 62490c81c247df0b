//! Golden tests for response envelope extraction.
//!
//! Bodies below are shaped like what the backend actually returns.

use carelink_wire::{extract_request_list, extract_server_message, parse_auth_response};
use serde_json::{json, Value};

struct MessageCase {
    id: &'static str,
    body: Value,
    expected: Option<&'static str>,
}

fn get_message_cases() -> Vec<MessageCase> {
    vec![
        MessageCase {
            id: "plain-string",
            body: json!("Service unavailable"),
            expected: Some("Service unavailable"),
        },
        MessageCase {
            id: "message-key",
            body: json!({"success": false, "message": "not found"}),
            expected: Some("not found"),
        },
        MessageCase {
            id: "error-key",
            body: json!({"error": "Email already registered"}),
            expected: Some("Email already registered"),
        },
        MessageCase {
            id: "message-beats-error",
            body: json!({"message": "first", "error": "second"}),
            expected: Some("first"),
        },
        MessageCase {
            id: "validation-array-objects",
            body: json!({"errors": [{"field": "email", "message": "Email is invalid"}]}),
            expected: Some("Email is invalid"),
        },
        MessageCase {
            id: "validation-array-strings",
            body: json!({"errors": ["Password too short", "Name required"]}),
            expected: Some("Password too short"),
        },
        MessageCase {
            id: "validation-object",
            body: json!({"errors": {"phoneNumber": "Phone number is required"}}),
            expected: Some("Phone number is required"),
        },
        MessageCase {
            id: "empty-message-skipped",
            body: json!({"message": "", "error": "Unauthorized"}),
            expected: Some("Unauthorized"),
        },
        MessageCase {
            id: "no-message",
            body: json!({"success": false}),
            expected: None,
        },
        MessageCase {
            id: "null-body",
            body: Value::Null,
            expected: None,
        },
    ]
}

#[test]
fn test_server_message_golden() {
    let mut failures = Vec::new();

    for case in get_message_cases() {
        let actual = extract_server_message(&case.body);
        if actual.as_deref() != case.expected {
            failures.push(format!(
                "[{}] expected {:?}, got {:?}",
                case.id, case.expected, actual
            ));
        }
    }

    assert!(failures.is_empty(), "Golden failures:\n{}", failures.join("\n"));
}

#[test]
fn test_request_list_from_filter_endpoint() {
    let body = json!({
        "success": true,
        "data": {
            "requests": [
                {
                    "_id": "65f0c2",
                    "name": "Jane Doe",
                    "serviceType": "medical",
                    "location": "12 Elm St",
                    "time": "2025-03-10T09:30:00.000Z",
                    "status": "pending",
                    "createdAt": "2025-03-01T08:00:00.000Z"
                },
                {"_id": "65f0c3", "status": "completed"},
                "garbage"
            ],
            "total": 3
        }
    });

    let requests = extract_request_list(&body);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].service_type.as_deref(), Some("medical"));
    assert_eq!(requests[0].created_at.as_deref(), Some("2025-03-01T08:00:00.000Z"));
    assert_eq!(requests[1].name, None);
}

#[test]
fn test_login_response() {
    let body = json!({
        "user": {
            "_id": "u1",
            "fullName": "Jane Doe",
            "email": "jane@example.com",
            "phoneNumber": "555-0100",
            "lastLogin": "2025-03-09T10:00:00.000Z",
            "role": "customer"
        },
        "tokens": {
            "access": {"token": "eyJ.access", "expires": "2025-03-10T10:00:00.000Z"},
            "refresh": {"token": "eyJ.refresh", "expires": "2025-04-09T10:00:00.000Z"}
        }
    });

    let auth = parse_auth_response(&body).unwrap();
    assert_eq!(auth.user.id, "u1");
    assert_eq!(auth.user.phone_number.as_deref(), Some("555-0100"));
    assert_eq!(auth.user.extra.get("role"), Some(&json!("customer")));
    assert_eq!(auth.tokens.access.token, "eyJ.access");
    assert_eq!(
        auth.tokens.refresh.map(|r| r.token).as_deref(),
        Some("eyJ.refresh")
    );

    assert!(parse_auth_response(&json!({"user": {"_id": "u1"}, "tokens": {}})).is_err());
}
