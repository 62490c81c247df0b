//! Authenticated request gateway.
//!
//! The single chokepoint for backend calls. Before each call the bearer token
//! is read from durable storage (never cached), and after each failed call the
//! transport failure is normalized, broadcast on the error bus, and returned.
//! There is no retry.

mod api;
mod http;
mod mock;

pub use api::*;
pub use http::*;
pub use mock::*;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::db::{SecureStore, AUTH_TOKEN_KEY};
use crate::error::{normalize, ApiError, ErrorBus, TransportFailure};

/// HTTP methods used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

/// A backend call before it reaches the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/v1.0/request`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Moves requests to the backend and reports raw outcomes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request. Success yields the response body (`Null` when empty).
    async fn send(&self, request: OutboundRequest) -> Result<Value, TransportFailure>;
}

/// Gateway for authenticated backend calls.
pub struct Gateway {
    store: Arc<dyn SecureStore>,
    transport: Arc<dyn Transport>,
    bus: Arc<ErrorBus>,
}

impl Gateway {
    pub fn with_bus(
        store: Arc<dyn SecureStore>,
        transport: Arc<dyn Transport>,
        bus: Arc<ErrorBus>,
    ) -> Self {
        Self {
            store,
            transport,
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<ErrorBus> {
        &self.bus
    }

    /// Send a request with the current bearer token attached.
    pub async fn execute(&self, request: OutboundRequest) -> Result<Value, ApiError> {
        let request = match self.bearer_token() {
            Some(token) => request.with_header("Authorization", format!("Bearer {}", token)),
            None => request,
        };

        let method = request.method;
        let path = request.path.clone();
        tracing::debug!(?method, path = %path, "Sending request");

        match self.transport.send(request).await {
            Ok(body) => Ok(body),
            Err(failure) => {
                let error = normalize(&failure);
                tracing::warn!(
                    ?method,
                    path = %path,
                    code = %error.code,
                    status = ?error.status,
                    message = %error.message,
                    "Request failed"
                );
                self.bus.emit(&error);
                Err(error)
            }
        }
    }

    fn bearer_token(&self) -> Option<String> {
        match self.store.get_item(AUTH_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read bearer token");
                None
            }
        }
    }
}
