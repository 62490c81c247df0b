//! Normalized API errors.
//!
//! Every failed backend call is classified into a small closed set of codes
//! and given a human-readable message before it reaches screen code. The raw
//! transport error never escapes the gateway.

mod bus;

pub use bus::*;

use std::fmt;

use carelink_wire::extract_server_message;
use serde_json::Value;
use thiserror::Error;

/// Shown when an error carries no usable message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorCode {
    /// HTTP status-derived code (422 is folded into 400)
    Http(u16),
    /// No response reached the client
    NetworkError,
    /// Client-side deadline elapsed
    Timeout,
    /// Cancelled, or a response with no usable status
    Unknown,
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorCode::Http(status) => write!(f, "{}", status),
            ApiErrorCode::NetworkError => f.write_str("NETWORK_ERROR"),
            ApiErrorCode::Timeout => f.write_str("TIMEOUT"),
            ApiErrorCode::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// A normalized API error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub code: ApiErrorCode,
    /// HTTP status when a response was received
    pub status: Option<u16>,
    /// Raw response body when a response was received
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(message: impl Into<String>, code: ApiErrorCode) -> Self {
        Self {
            message: message.into(),
            code,
            status: None,
            details: None,
        }
    }

    pub fn is_network_error(&self) -> bool {
        self.code == ApiErrorCode::NetworkError
    }
}

/// How a call failed, as reported by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFailure {
    /// The caller cancelled the request
    Cancelled,
    /// The request exceeded its deadline
    TimedOut,
    /// No response was received (offline, DNS, connection refused, ...)
    NoResponse { reason: String },
    /// A response arrived with a non-success status
    Status { status: u16, body: Value },
}

/// Classify a transport failure and pick its message.
pub fn normalize(failure: &TransportFailure) -> ApiError {
    let (status, body) = match failure {
        TransportFailure::Cancelled => {
            return ApiError::new("Request cancelled", ApiErrorCode::Unknown)
        }
        TransportFailure::TimedOut => {
            return ApiError::new("Request timed out", ApiErrorCode::Timeout)
        }
        TransportFailure::NoResponse { .. } => {
            return ApiError::new(
                "Network error. Check your internet connection.",
                ApiErrorCode::NetworkError,
            )
        }
        TransportFailure::Status { status, body } => (*status, body),
    };

    let (code, default_message) = match status {
        400 | 422 => (ApiErrorCode::Http(400), "Bad request. Please check the input."),
        404 => (ApiErrorCode::Http(404), "Resource not found."),
        500 => (ApiErrorCode::Http(500), "Server error. Please try again."),
        0 => (ApiErrorCode::Unknown, "Unexpected error occurred."),
        other => (ApiErrorCode::Http(other), "Unexpected error occurred."),
    };

    ApiError {
        message: extract_server_message(body).unwrap_or_else(|| default_message.to_string()),
        code,
        status: Some(status),
        details: Some(body.clone()),
    }
}

/// Message to show for any error, or [`DEFAULT_ERROR_MESSAGE`] when it has none.
pub fn error_message(err: &dyn std::error::Error) -> String {
    error_message_or(err, DEFAULT_ERROR_MESSAGE)
}

pub fn error_message_or(err: &dyn std::error::Error, fallback: &str) -> String {
    let message = err.to_string();
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
