//! Patient requests screen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use carelink_wire::CreateRequestPayload;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use super::{map_requests, RequestList, ScreenError, ScreenResult};
use crate::gateway::Gateway;
use crate::models::{ServiceRequest, ServiceType};
use crate::validation::{
    format_date_input, format_iso_utc, format_time_input, to_utc, validate_schedule,
    ValidationError, ValidationResult,
};

/// Contents of the new-request form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestForm {
    pub patient_name: String,
    pub service: ServiceType,
    pub address: String,
    /// Masked `YYYY-MM-DD` input
    pub date: String,
    /// Masked `HH:MM` input
    pub time: String,
}

impl RequestForm {
    pub fn set_date_input(&mut self, text: &str) {
        self.date = format_date_input(text);
    }

    pub fn set_time_input(&mut self, text: &str) {
        self.time = format_time_input(text);
    }

    /// Check the form and build the create payload, reading date and time in `offset`.
    pub fn to_payload(&self, offset: FixedOffset) -> ValidationResult<CreateRequestPayload> {
        let fields = [&self.patient_name, &self.address, &self.date, &self.time];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ValidationError::MissingFields);
        }

        let schedule = validate_schedule(&self.date, &self.time)?;
        let time = format_iso_utc(to_utc(schedule, offset)?);

        Ok(CreateRequestPayload {
            name: self.patient_name.clone(),
            service_type: self.service.code().to_string(),
            location: self.address.clone(),
            time,
        })
    }
}

/// Controller for the patient's own requests and the creation form.
pub struct PatientRequests {
    gateway: Arc<Gateway>,
    offset: FixedOffset,
    form: Mutex<RequestForm>,
    list: RequestList,
    submitting: AtomicBool,
}

impl PatientRequests {
    pub fn new(gateway: Arc<Gateway>, offset: FixedOffset) -> Self {
        Self {
            gateway,
            offset,
            form: Mutex::new(RequestForm::default()),
            list: RequestList::default(),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.list.snapshot()
    }

    pub fn form(&self) -> RequestForm {
        self.lock_form().clone()
    }

    pub fn set_patient_name(&self, name: &str) {
        self.lock_form().patient_name = name.to_string();
    }

    pub fn set_service(&self, service: ServiceType) {
        self.lock_form().service = service;
    }

    /// Select a service by its user-facing label.
    pub fn set_service_label(&self, label: &str) -> ScreenResult<()> {
        let service = ServiceType::from_label(label)
            .ok_or_else(|| ValidationError::UnknownService(label.to_string()))?;
        self.set_service(service);
        Ok(())
    }

    pub fn set_address(&self, address: &str) {
        self.lock_form().address = address.to_string();
    }

    /// Apply the date mask and return the masked text.
    pub fn set_date_input(&self, text: &str) -> String {
        let mut form = self.lock_form();
        form.set_date_input(text);
        form.date.clone()
    }

    /// Apply the time mask and return the masked text.
    pub fn set_time_input(&self, text: &str) -> String {
        let mut form = self.lock_form();
        form.set_time_input(text);
        form.time.clone()
    }

    pub fn reset_form(&self) {
        *self.lock_form() = RequestForm::default();
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// Fetch the patient's requests and replace the local list.
    pub async fn refresh(&self) -> ScreenResult<Vec<ServiceRequest>> {
        let generation = self.list.begin();
        let body = self.gateway.list_own_requests().await?;
        self.list.apply(generation, map_requests(&body));
        Ok(self.list.snapshot())
    }

    /// Validate and submit the form, then reload the list and clear the form.
    ///
    /// Nothing is sent when validation fails. A failed reload after a
    /// successful submit is logged and does not fail the submit.
    pub async fn submit(&self) -> ScreenResult<()> {
        let _lock = SubmissionLock::acquire(&self.submitting)?;

        let payload = self.form().to_payload(self.offset)?;
        self.gateway.create_request(&payload).await?;
        tracing::info!(service = %payload.service_type, time = %payload.time, "Request submitted");

        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Failed to reload requests after submit");
        }
        self.reset_form();
        Ok(())
    }

    fn lock_form(&self) -> MutexGuard<'_, RequestForm> {
        self.form.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Holds the submitting flag for the duration of one submit.
struct SubmissionLock<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SubmissionLock<'a> {
    fn acquire(flag: &'a AtomicBool) -> ScreenResult<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ScreenError::Busy("A request is already being submitted".into()))?;
        Ok(Self { flag })
    }
}

impl Drop for SubmissionLock<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::error::{ErrorBus, TransportFailure};
    use crate::gateway::MockTransport;
    use crate::models::RequestStatus;
    use serde_json::json;
    use tokio::sync::Notify;

    fn setup() -> (Arc<MockTransport>, PatientRequests) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let transport = Arc::new(MockTransport::new());
        let gateway = Gateway::with_bus(store, transport.clone(), Arc::new(ErrorBus::new()));
        let screen = PatientRequests::new(Arc::new(gateway), crate::config::utc());
        (transport, screen)
    }

    fn fill(screen: &PatientRequests) {
        screen.set_patient_name("Jane Doe");
        screen.set_service_label("Medical Transport").unwrap();
        screen.set_address("12 Elm St");
        screen.set_date_input("20250310");
        screen.set_time_input("0930");
    }

    #[test]
    fn test_form_payload() {
        let mut form = RequestForm {
            patient_name: "Jane Doe".into(),
            service: ServiceType::HomeCheckup,
            address: "12 Elm St".into(),
            ..Default::default()
        };
        form.set_date_input("2025-03-10");
        form.set_time_input("09:30");

        let payload = form.to_payload(crate::config::utc()).unwrap();
        assert_eq!(payload.service_type, "checkup");
        assert_eq!(payload.time, "2025-03-10T09:30:00.000Z");
    }

    #[test]
    fn test_form_requires_all_fields() {
        let form = RequestForm {
            patient_name: "Jane Doe".into(),
            date: "2025-03-10".into(),
            time: "09:30".into(),
            ..Default::default()
        };
        assert_eq!(
            form.to_payload(crate::config::utc()),
            Err(ValidationError::MissingFields)
        );
    }

    #[test]
    fn test_unknown_service_label() {
        let (_, screen) = setup();
        assert!(matches!(
            screen.set_service_label("Dental"),
            Err(ScreenError::Validation(ValidationError::UnknownService(_)))
        ));
        assert_eq!(screen.form().service, ServiceType::MedicalTransport);
    }

    #[tokio::test]
    async fn test_submit_then_reload() {
        let (transport, screen) = setup();
        fill(&screen);
        transport.push_response(json!({"success": true}));
        transport.push_response(json!({"data": {"requests": [{
            "_id": "r1",
            "name": "Jane Doe",
            "serviceType": "medical",
            "location": "12 Elm St",
            "time": "2025-03-10T09:30:00.000Z",
            "status": "pending"
        }]}}));

        screen.submit().await.unwrap();

        let sent = &transport.requests()[0];
        let body = sent.body.as_ref().unwrap();
        assert_eq!(body["serviceType"], "medical");
        assert_eq!(body["time"], "2025-03-10T09:30:00.000Z");

        let requests = screen.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, RequestStatus::Pending);
        assert_eq!(screen.form(), RequestForm::default());
    }

    #[tokio::test]
    async fn test_invalid_form_sends_nothing() {
        let (transport, screen) = setup();
        fill(&screen);
        screen.set_date_input("20240230");

        let err = screen.submit().await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid date");
        assert!(transport.requests().is_empty());
        assert!(!screen.is_submitting());
        assert_eq!(screen.form().date, "2024-02-30");
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_form() {
        let (transport, screen) = setup();
        fill(&screen);
        transport.push_failure(TransportFailure::Status {
            status: 500,
            body: json!({}),
        });

        let err = screen.submit().await.unwrap_err();
        assert!(matches!(err, ScreenError::Api(_)));
        assert_eq!(screen.form().patient_name, "Jane Doe");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_second_submit_is_rejected_while_in_flight() {
        let (transport, screen) = setup();
        let screen = Arc::new(screen);
        fill(&screen);

        let gate = Arc::new(Notify::new());
        transport.push_gated_response(json!({}), gate.clone());
        transport.push_response(json!([]));

        let first = {
            let screen = Arc::clone(&screen);
            tokio::spawn(async move { screen.submit().await })
        };
        while !screen.is_submitting() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(screen.submit().await, Err(ScreenError::Busy(_))));

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(!screen.is_submitting());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_list() {
        let (transport, screen) = setup();
        transport.push_response(json!([{"_id": "r1"}]));
        transport.push_failure(TransportFailure::TimedOut);

        screen.refresh().await.unwrap();
        assert!(screen.refresh().await.is_err());
        assert_eq!(screen.requests().len(), 1);
    }
}
