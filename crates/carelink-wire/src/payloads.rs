//! JSON payloads exchanged with the backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Login body for either portal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration body for either portal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
}

/// Successful login/registration response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub user: AuthUser,
    pub tokens: AuthTokens,
}

/// User profile as returned by the auth endpoints.
///
/// Only the fields the client reads are typed; everything else the backend
/// sends is kept in `extra` so the cached profile round-trips unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTokens {
    pub access: TokenGrant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<TokenGrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

/// Body of `POST /request`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestPayload {
    pub name: String,
    /// Backend service code (`medical`, `appointment`, `checkup`)
    pub service_type: String,
    pub location: String,
    /// Scheduled time as an ISO-8601 UTC string
    pub time: String,
}

impl CreateRequestPayload {
    /// Serialize with a fixed field order, used to derive idempotency keys.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Body of `PATCH /request/:id/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdatePayload {
    pub status: String,
}

/// Query parameters accepted by `GET /request/filter`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilters {
    pub status: Option<String>,
    pub service_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl RequestFilters {
    /// Query pairs for the filters that are set, in a stable order.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        [
            ("status", &self.status),
            ("serviceType", &self.service_type),
            ("startDate", &self.start_date),
            ("endDate", &self.end_date),
            ("sortBy", &self.sort_by),
            ("sortOrder", &self.sort_order),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_query_pairs().is_empty()
    }
}

/// A service request record as the backend stores it.
///
/// Every field is optional: list endpoints are consumed tolerantly and the
/// client fills in display defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendRequest {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}
