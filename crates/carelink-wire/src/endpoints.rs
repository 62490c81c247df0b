//! REST endpoint paths.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Version prefix shared by every backend route.
pub const API_VERSION_PREFIX: &str = "/v1.0";

/// Authentication portal a user signs in through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    /// Patient sign-in (`customer` accounts)
    Patient,
    /// Admin/doctor sign-in
    Admin,
}

impl Portal {
    /// Path segment the backend uses for this portal.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Portal::Patient => "customer",
            Portal::Admin => "admin",
        }
    }
}

pub fn register_path(portal: Portal) -> String {
    format!("{}/auth/register/{}", API_VERSION_PREFIX, portal.path_segment())
}

pub fn login_path(portal: Portal) -> String {
    format!("{}/auth/login/{}", API_VERSION_PREFIX, portal.path_segment())
}

/// Create (`POST`) and list-own (`GET`) route for service requests.
pub fn requests_path() -> String {
    format!("{}/request", API_VERSION_PREFIX)
}

/// Filtered listing across all patients.
pub fn filtered_requests_path() -> String {
    format!("{}/request/filter", API_VERSION_PREFIX)
}

/// Status update route for a single request.
pub fn request_status_path(request_id: &str) -> String {
    format!(
        "{}/request/{}/status",
        API_VERSION_PREFIX,
        encode_path_segment(request_id)
    )
}

/// Percent-encode everything but unreserved characters.
fn encode_path_segment(segment: &str) -> String {
    // Form encoding writes spaces as '+'; a literal '+' is already %2B
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
