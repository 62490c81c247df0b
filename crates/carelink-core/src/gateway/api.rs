//! Backend endpoint operations.

use carelink_wire::{
    filtered_requests_path, login_path, parse_auth_response, register_path, request_status_path,
    requests_path, AuthResponse, CreateRequestPayload, Credentials, Portal, RegistrationPayload,
    RequestFilters, StatusUpdatePayload,
};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{Gateway, Method, OutboundRequest};
use crate::error::{ApiError, ApiErrorCode};
use crate::models::RequestStatus;

/// Header carrying the create-request idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

impl Gateway {
    pub async fn register(
        &self,
        portal: Portal,
        payload: &RegistrationPayload,
    ) -> Result<AuthResponse, ApiError> {
        let request = OutboundRequest::new(Method::Post, register_path(portal))
            .with_body(to_body(payload)?);
        let body = self.execute(request).await?;
        auth_response(&body)
    }

    pub async fn login(
        &self,
        portal: Portal,
        credentials: &Credentials,
    ) -> Result<AuthResponse, ApiError> {
        let request = OutboundRequest::new(Method::Post, login_path(portal))
            .with_body(to_body(credentials)?);
        let body = self.execute(request).await?;
        auth_response(&body)
    }

    /// Submit a new service request. Identical payloads share an idempotency key.
    pub async fn create_request(&self, payload: &CreateRequestPayload) -> Result<Value, ApiError> {
        let request = OutboundRequest::new(Method::Post, requests_path())
            .with_header(IDEMPOTENCY_HEADER, idempotency_key(payload)?)
            .with_body(to_body(payload)?);
        self.execute(request).await
    }

    /// Requests belonging to the signed-in patient (raw envelope).
    pub async fn list_own_requests(&self) -> Result<Value, ApiError> {
        self.execute(OutboundRequest::new(Method::Get, requests_path()))
            .await
    }

    /// Requests across all patients (raw envelope).
    pub async fn list_filtered_requests(&self, filters: &RequestFilters) -> Result<Value, ApiError> {
        let request = OutboundRequest::new(Method::Get, filtered_requests_path())
            .with_query(filters.to_query_pairs());
        self.execute(request).await
    }

    pub async fn update_request_status(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<Value, ApiError> {
        let payload = StatusUpdatePayload {
            status: status.as_str().to_string(),
        };
        let request = OutboundRequest::new(Method::Patch, request_status_path(request_id))
            .with_body(to_body(&payload)?);
        self.execute(request).await
    }
}

/// SHA-256 of the canonical payload JSON, hex encoded.
pub fn idempotency_key(payload: &CreateRequestPayload) -> Result<String, ApiError> {
    let canonical = payload.to_canonical_json().map_err(encode_error)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

fn to_body<T: Serialize>(payload: &T) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(encode_error)
}

fn encode_error(e: serde_json::Error) -> ApiError {
    ApiError::new(format!("Failed to encode request: {}", e), ApiErrorCode::Unknown)
}

fn auth_response(body: &Value) -> Result<AuthResponse, ApiError> {
    parse_auth_response(body).map_err(|e| {
        tracing::warn!(error = %e, "Malformed auth response");
        ApiError {
            message: "Unexpected error occurred.".into(),
            code: ApiErrorCode::Unknown,
            status: None,
            details: Some(body.clone()),
        }
    })
}
