//! Request lifecycle screen controllers.
//!
//! - [`PatientRequests`]: the patient's own requests and the creation form
//! - [`AdminDashboard`]: every request, with accept/complete actions
//!
//! Controllers hold local list state behind short-lived locks; no lock is held
//! across a backend call.

mod admin;
mod patient;

pub use admin::*;
pub use patient::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use carelink_wire::extract_request_list;
use serde_json::Value;
use thiserror::Error;

use crate::error::ApiError;
use crate::models::{ServiceRequest, TransitionError};
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Request not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Busy(String),
}

pub type ScreenResult<T> = Result<T, ScreenError>;

/// Map a list response envelope to display models. Unrecognized shapes yield
/// an empty list.
pub fn map_requests(body: &Value) -> Vec<ServiceRequest> {
    extract_request_list(body)
        .iter()
        .map(ServiceRequest::from_backend)
        .collect()
}

#[derive(Default)]
struct ListState {
    requests: Vec<ServiceRequest>,
    applied: u64,
}

/// Local request list that only accepts responses newer than the last one applied.
#[derive(Default)]
pub(crate) struct RequestList {
    state: Mutex<ListState>,
    issued: AtomicU64,
}

impl RequestList {
    /// Generation number for a fetch about to start.
    pub(crate) fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace the list unless a newer fetch already landed. Returns whether
    /// the list was replaced.
    pub(crate) fn apply(&self, generation: u64, requests: Vec<ServiceRequest>) -> bool {
        let mut state = self.lock();
        if generation <= state.applied {
            tracing::debug!(generation, applied = state.applied, "Discarding stale list");
            return false;
        }
        state.applied = generation;
        state.requests = requests;
        true
    }

    pub(crate) fn snapshot(&self) -> Vec<ServiceRequest> {
        self.lock().requests.clone()
    }

    pub(crate) fn find(&self, id: &str) -> Option<ServiceRequest> {
        self.lock().requests.iter().find(|r| r.id == id).cloned()
    }

    /// Run `f` on the entry with `id`, if present. Fetches begun before the
    /// change can no longer replace the list.
    pub(crate) fn update<T>(&self, id: &str, f: impl FnOnce(&mut ServiceRequest) -> T) -> Option<T> {
        let mut state = self.lock();
        let result = state.requests.iter_mut().find(|r| r.id == id).map(f);
        if result.is_some() {
            state.applied = state.applied.max(self.issued.load(Ordering::SeqCst));
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
