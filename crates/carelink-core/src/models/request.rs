//! Service request models.

use std::fmt;

use carelink_wire::BackendRequest;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of service a patient can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    MedicalTransport,
    DoctorAppointment,
    HomeCheckup,
}

impl ServiceType {
    /// All service types, in the order they are offered to patients.
    pub const ALL: [ServiceType; 3] = [
        ServiceType::MedicalTransport,
        ServiceType::DoctorAppointment,
        ServiceType::HomeCheckup,
    ];

    /// User-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::MedicalTransport => "Medical Transport",
            ServiceType::DoctorAppointment => "Doctor Appointment",
            ServiceType::HomeCheckup => "Home Check-up",
        }
    }

    /// Backend enum code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceType::MedicalTransport => "medical",
            ServiceType::DoctorAppointment => "appointment",
            ServiceType::HomeCheckup => "checkup",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl Default for ServiceType {
    fn default() -> Self {
        ServiceType::MedicalTransport
    }
}

/// Request lifecycle status. Only moves forward: pending → accepted → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "completed" => Some(RequestStatus::Completed),
            _ => None,
        }
    }

    /// Capitalized label for status badges.
    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Accepted => "Accepted",
            RequestStatus::Completed => "Completed",
        }
    }

    /// The single status this one may move to, if any.
    pub fn next(&self) -> Option<RequestStatus> {
        match self {
            RequestStatus::Pending => Some(RequestStatus::Accepted),
            RequestStatus::Accepted => Some(RequestStatus::Completed),
            RequestStatus::Completed => None,
        }
    }

    pub fn can_transition_to(&self, target: RequestStatus) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admin action offered for a request in its current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Complete,
}

impl RequestAction {
    /// Status the action moves a request to.
    pub fn target(&self) -> RequestStatus {
        match self {
            RequestAction::Accept => RequestStatus::Accepted,
            RequestAction::Complete => RequestStatus::Completed,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot move request from {from} to {to}")]
pub struct TransitionError {
    pub from: RequestStatus,
    pub to: RequestStatus,
}

/// Placeholder shown when the backend omits a requester name.
pub const UNKNOWN_PATIENT: &str = "Unknown Patient";
/// Placeholder shown when the backend omits an address.
pub const NO_ADDRESS: &str = "No address provided";
/// Placeholder for missing dates and times.
pub const NOT_AVAILABLE: &str = "N/A";

/// A service request as shown on the patient and admin screens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRequest {
    /// Backend id (or a local UUID when the backend sent none)
    pub id: String,
    /// Requester name
    pub patient_name: String,
    pub service: ServiceType,
    /// Scheduled date and time, if the backend sent a parseable one
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub address: String,
    /// The backend sent no id, so the request cannot be updated
    #[serde(default)]
    pub local_only: bool,
}

impl ServiceRequest {
    /// Build from a backend record, filling display defaults for missing fields.
    pub fn from_backend(record: &BackendRequest) -> Self {
        let backend_id = record.id.clone().filter(|id| !id.is_empty());
        Self {
            local_only: backend_id.is_none(),
            id: backend_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            patient_name: record
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_PATIENT.into()),
            service: record
                .service_type
                .as_deref()
                .and_then(ServiceType::from_code)
                .unwrap_or_default(),
            scheduled_at: record
                .time
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc)),
            status: record
                .status
                .as_deref()
                .and_then(RequestStatus::parse)
                .unwrap_or(RequestStatus::Pending),
            address: record
                .location
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| NO_ADDRESS.into()),
        }
    }

    /// Scheduled date as `YYYY-MM-DD` in the given offset.
    pub fn display_date(&self, offset: FixedOffset) -> String {
        self.scheduled_at
            .map(|t| t.with_timezone(&offset).format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.into())
    }

    /// Scheduled time as `HH:MM` in the given offset.
    pub fn display_time(&self, offset: FixedOffset) -> String {
        self.scheduled_at
            .map(|t| t.with_timezone(&offset).format("%H:%M").to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.into())
    }

    /// The admin action currently available, if any.
    pub fn available_action(&self) -> Option<RequestAction> {
        if self.local_only {
            return None;
        }
        match self.status {
            RequestStatus::Pending => Some(RequestAction::Accept),
            RequestStatus::Accepted => Some(RequestAction::Complete),
            RequestStatus::Completed => None,
        }
    }

    /// Move to `target` if it is the next status; otherwise leave unchanged.
    pub fn advance_to(&mut self, target: RequestStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(target) {
            return Err(TransitionError {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }
}

/// Per-status totals for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u32,
    pub accepted: u32,
    pub completed: u32,
}

impl StatusCounts {
    pub fn from_requests(requests: &[ServiceRequest]) -> Self {
        requests.iter().fold(Self::default(), |mut counts, r| {
            match r.status {
                RequestStatus::Pending => counts.pending += 1,
                RequestStatus::Accepted => counts.accepted += 1,
                RequestStatus::Completed => counts.completed += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> u32 {
        self.pending + self.accepted + self.completed
    }
}
