//! Admin dashboard: triage of all service requests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use carelink_wire::RequestFilters;

use super::{map_requests, RequestList, ScreenError, ScreenResult};
use crate::gateway::Gateway;
use crate::models::{
    RequestAction, RequestStatus, ServiceRequest, StatusCounts, TransitionError,
};

pub struct AdminDashboard {
    gateway: Arc<Gateway>,
    list: RequestList,
    in_flight: Mutex<HashSet<String>>,
}

impl AdminDashboard {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            list: RequestList::default(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.list.snapshot()
    }

    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::from_requests(&self.list.snapshot())
    }

    /// Action offered for the request with `id`, if it is known and not completed.
    pub fn available_action(&self, id: &str) -> Option<RequestAction> {
        self.list.find(id).and_then(|r| r.available_action())
    }

    /// Whether a status change for `id` is waiting on the backend.
    pub fn is_in_flight(&self, id: &str) -> bool {
        self.lock_in_flight().contains(id)
    }

    /// Fetch every request, unfiltered.
    pub async fn refresh(&self) -> ScreenResult<Vec<ServiceRequest>> {
        self.refresh_with(&RequestFilters::default()).await
    }

    pub async fn refresh_with(&self, filters: &RequestFilters) -> ScreenResult<Vec<ServiceRequest>> {
        let generation = self.list.begin();
        let body = self.gateway.list_filtered_requests(filters).await?;
        self.list.apply(generation, map_requests(&body));
        Ok(self.list.snapshot())
    }

    /// Accept a pending request.
    pub async fn accept(&self, id: &str) -> ScreenResult<ServiceRequest> {
        self.transition(id, RequestAction::Accept).await
    }

    /// Complete an accepted request.
    pub async fn complete(&self, id: &str) -> ScreenResult<ServiceRequest> {
        self.transition(id, RequestAction::Complete).await
    }

    /// Send the status change, then apply it locally once the backend confirms.
    async fn transition(&self, id: &str, action: RequestAction) -> ScreenResult<ServiceRequest> {
        let target = action.target();
        let current = self
            .list
            .find(id)
            .filter(|r| !r.local_only)
            .ok_or_else(|| ScreenError::NotFound(id.to_string()))?;
        if !current.status.can_transition_to(target) {
            return Err(TransitionError {
                from: current.status,
                to: target,
            }
            .into());
        }

        let _guard = InFlightGuard::acquire(&self.in_flight, id)?;
        self.gateway.update_request_status(id, target).await?;
        tracing::info!(request_id = id, status = %target, "Request status updated");

        self.apply_confirmed(id, target)
    }

    fn apply_confirmed(&self, id: &str, target: RequestStatus) -> ScreenResult<ServiceRequest> {
        let updated = self.list.update(id, |request| {
            if request.status != target {
                request.advance_to(target)?;
            }
            Ok::<_, TransitionError>(request.clone())
        });

        match updated {
            Some(result) => Ok(result?),
            // A refresh replaced the list while the update was in flight
            None => Err(ScreenError::NotFound(id.to_string())),
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        lock(&self.in_flight)
    }
}

/// Marks one request id as mutating until dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, id: &str) -> ScreenResult<Self> {
        if !lock(set).insert(id.to_string()) {
            return Err(ScreenError::Busy(format!(
                "Request {} is already being updated",
                id
            )));
        }
        Ok(Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
