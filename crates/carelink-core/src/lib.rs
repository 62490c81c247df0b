//! CareLink Core Library
//!
//! Behavioural core of the CareLink mobile client: patients submit healthcare
//! service requests, admins (doctors) triage them, and both track status.
//!
//! # Architecture
//!
//! ```text
//!   Native shell (Swift / Kotlin)
//!            │  UniFFI
//!            ▼
//!   ┌─────────────────┐     ┌──────────────────────────────┐
//!   │  SessionStore   │     │  PatientRequests / Admin     │
//!   │  (auth state)   │     │  Dashboard (screens)         │
//!   └────────┬────────┘     └──────────────┬───────────────┘
//!            │                             │
//!            └──────────────┬──────────────┘
//!                           ▼
//!                 ┌───────────────────┐        ┌───────────┐
//!                 │      Gateway      │──fail─▶│ ErrorBus  │
//!                 │ bearer + normalize│        └───────────┘
//!                 └─────────┬─────────┘
//!                           ▼
//!                 Transport (reqwest) ──▶ REST backend /v1.0
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite key/value secure store for the session keys
//! - [`error`]: Normalized API errors and the process-wide error bus
//! - [`gateway`]: Authenticated request gateway and transports
//! - [`session`]: Auth state machine with expiry
//! - [`screens`]: Patient requests and admin dashboard controllers
//! - [`validation`]: Input masks and form validation
//! - [`config`]: Client configuration

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod screens;
pub mod session;
pub mod validation;

// Re-export commonly used types
pub use config::{ClientConfig, ExpiredCleanup};
pub use db::{Database, SecureStore, SqliteStore};
pub use error::{ApiError, ApiErrorCode, ErrorBus};
pub use gateway::{Gateway, HttpTransport, MockTransport, Transport};
pub use models::{RequestAction, RequestStatus, Role, ServiceRequest, ServiceType, StatusCounts};
pub use screens::{AdminDashboard, PatientRequests, RequestForm, ScreenError};
pub use session::{AuthState, Destination, SessionError, SessionSnapshot, SessionStore};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use carelink_wire::{Portal, RegistrationPayload, RequestFilters};
use chrono::FixedOffset;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum CareLinkError {
    /// Form input rejected before anything was sent
    #[error("{0}")]
    Validation(String),

    /// Backend call failed; `code` is a status number or NETWORK_ERROR, TIMEOUT, UNKNOWN
    #[error("{error_message}")]
    Api {
        error_message: String,
        code: String,
        status: Option<u16>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Busy(String),
}

impl From<ApiError> for CareLinkError {
    fn from(e: ApiError) -> Self {
        CareLinkError::Api {
            error_message: error::error_message(&e),
            code: e.code.to_string(),
            status: e.status,
        }
    }
}

impl From<db::DbError> for CareLinkError {
    fn from(e: db::DbError) -> Self {
        CareLinkError::Storage(e.to_string())
    }
}

impl From<config::ConfigError> for CareLinkError {
    fn from(e: config::ConfigError) -> Self {
        CareLinkError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for CareLinkError {
    fn from(e: reqwest::Error) -> Self {
        CareLinkError::Config(format!("Failed to build HTTP client: {}", e))
    }
}

impl From<validation::ValidationError> for CareLinkError {
    fn from(e: validation::ValidationError) -> Self {
        CareLinkError::Validation(error::error_message(&e))
    }
}

impl From<SessionError> for CareLinkError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Validation(e) => e.into(),
            SessionError::Auth { message, error } => CareLinkError::Api {
                error_message: message,
                code: error.code.to_string(),
                status: error.status,
            },
            SessionError::Storage(e) => e.into(),
            SessionError::Encode(e) => CareLinkError::Storage(e.to_string()),
        }
    }
}

impl From<ScreenError> for CareLinkError {
    fn from(e: ScreenError) -> Self {
        match e {
            ScreenError::Validation(e) => e.into(),
            ScreenError::Api(e) => e.into(),
            ScreenError::InvalidTransition(e) => CareLinkError::InvalidTransition(e.to_string()),
            ScreenError::NotFound(id) => CareLinkError::NotFound(id),
            ScreenError::Busy(message) => CareLinkError::Busy(message),
        }
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Build a client from a TOML configuration document (empty for defaults).
#[uniffi::export]
pub fn open_client(config_toml: String) -> Result<Arc<CareLinkClient>, CareLinkError> {
    let config = ClientConfig::from_toml_str(&config_toml)?;
    logging::init_logging(&config.log_filter);
    let db = match &config.database_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    let transport = HttpTransport::new(config.base_url.clone(), config.request_timeout())?;
    tracing::info!(base_url = %config.base_url, "Opening CareLink client");

    Ok(Arc::new(CareLinkClient::with_transport(
        config,
        Arc::new(SqliteStore::new(db)),
        Arc::new(transport),
        ErrorBus::global(),
    )))
}

/// Client with default configuration and in-memory storage (for testing).
#[uniffi::export]
pub fn open_client_in_memory() -> Result<Arc<CareLinkClient>, CareLinkError> {
    open_client(String::new())
}

/// Install the log subscriber. Returns false if one was already installed.
#[uniffi::export]
pub fn init_logging(filter: String) -> bool {
    logging::init_logging(&filter)
}

/// Labels of the services a patient can request, in display order.
#[uniffi::export]
pub fn service_labels() -> Vec<String> {
    ServiceType::ALL.iter().map(|s| s.label().to_string()).collect()
}

// =========================================================================
// Error Listener
// =========================================================================

/// Receives every normalized API failure.
#[uniffi::export(callback_interface)]
pub trait ApiErrorListener: Send + Sync {
    fn on_error(&self, error: FfiApiError);
}

// =========================================================================
// Main API Object
// =========================================================================

/// One signed-in (or signing-in) app instance.
#[derive(uniffi::Object)]
pub struct CareLinkClient {
    offset: FixedOffset,
    bus: Arc<ErrorBus>,
    session: SessionStore,
    patient: PatientRequests,
    admin: AdminDashboard,
}

impl CareLinkClient {
    /// Wire a client over an arbitrary store and transport.
    pub fn with_transport(
        config: ClientConfig,
        store: Arc<dyn SecureStore>,
        transport: Arc<dyn Transport>,
        bus: Arc<ErrorBus>,
    ) -> Self {
        let offset = config.utc_offset();
        let gateway = Arc::new(Gateway::with_bus(store.clone(), transport, bus.clone()));
        Self {
            offset,
            bus,
            session: SessionStore::new(store, gateway.clone(), &config),
            patient: PatientRequests::new(gateway.clone(), offset),
            admin: AdminDashboard::new(gateway),
        }
    }

    pub fn session_store(&self) -> &SessionStore {
        &self.session
    }

    fn to_ffi(&self, requests: Vec<ServiceRequest>) -> Vec<FfiServiceRequest> {
        requests
            .iter()
            .map(|r| FfiServiceRequest::new(r, self.offset))
            .collect()
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl CareLinkClient {
    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Restore the persisted session. Call once at launch.
    pub fn initialize(&self) -> FfiSessionSnapshot {
        self.session.initialize().into()
    }

    pub fn session(&self) -> FfiSessionSnapshot {
        self.session.snapshot().into()
    }

    pub async fn login(
        &self,
        portal: FfiPortal,
        email: String,
        password: String,
    ) -> Result<FfiSessionSnapshot, CareLinkError> {
        let snapshot = self.session.login(portal.into(), &email, &password).await?;
        Ok(snapshot.into())
    }

    pub async fn register(
        &self,
        portal: FfiPortal,
        full_name: String,
        email: String,
        phone_number: String,
        password: String,
    ) -> Result<FfiSessionSnapshot, CareLinkError> {
        let payload = RegistrationPayload {
            full_name,
            email,
            phone_number,
            password,
        };
        let snapshot = self.session.register(portal.into(), &payload).await?;
        Ok(snapshot.into())
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn request_form(&self) -> FfiRequestForm {
        self.patient.form().into()
    }

    pub fn set_patient_name(&self, name: String) {
        self.patient.set_patient_name(&name);
    }

    pub fn set_service_label(&self, label: String) -> Result<(), CareLinkError> {
        Ok(self.patient.set_service_label(&label)?)
    }

    pub fn set_address(&self, address: String) {
        self.patient.set_address(&address);
    }

    /// Apply the date mask; returns the text to display.
    pub fn set_date_input(&self, text: String) -> String {
        self.patient.set_date_input(&text)
    }

    /// Apply the time mask; returns the text to display.
    pub fn set_time_input(&self, text: String) -> String {
        self.patient.set_time_input(&text)
    }

    pub fn reset_form(&self) {
        self.patient.reset_form();
    }

    pub fn is_submitting(&self) -> bool {
        self.patient.is_submitting()
    }

    pub fn own_requests(&self) -> Vec<FfiServiceRequest> {
        self.to_ffi(self.patient.requests())
    }

    pub async fn refresh_own_requests(&self) -> Result<Vec<FfiServiceRequest>, CareLinkError> {
        let requests = self.patient.refresh().await?;
        Ok(self.to_ffi(requests))
    }

    /// Submit the form; returns the reloaded list.
    pub async fn submit_request(&self) -> Result<Vec<FfiServiceRequest>, CareLinkError> {
        self.patient.submit().await?;
        Ok(self.own_requests())
    }

    // =========================================================================
    // Admin Operations
    // =========================================================================

    pub fn dashboard_requests(&self) -> Vec<FfiServiceRequest> {
        self.to_ffi(self.admin.requests())
    }

    pub async fn refresh_dashboard(&self) -> Result<Vec<FfiServiceRequest>, CareLinkError> {
        let requests = self.admin.refresh().await?;
        Ok(self.to_ffi(requests))
    }

    pub async fn refresh_dashboard_filtered(
        &self,
        filters: FfiRequestFilters,
    ) -> Result<Vec<FfiServiceRequest>, CareLinkError> {
        let requests = self.admin.refresh_with(&filters.into()).await?;
        Ok(self.to_ffi(requests))
    }

    pub async fn accept_request(&self, id: String) -> Result<FfiServiceRequest, CareLinkError> {
        let request = self.admin.accept(&id).await?;
        Ok(FfiServiceRequest::new(&request, self.offset))
    }

    pub async fn complete_request(&self, id: String) -> Result<FfiServiceRequest, CareLinkError> {
        let request = self.admin.complete(&id).await?;
        Ok(FfiServiceRequest::new(&request, self.offset))
    }

    pub fn is_in_flight(&self, id: String) -> bool {
        self.admin.is_in_flight(&id)
    }

    pub fn status_counts(&self) -> FfiStatusCounts {
        self.admin.status_counts().into()
    }

    // =========================================================================
    // Error Bus
    // =========================================================================

    /// Register a listener for API failures; returns an id for unsubscribing.
    pub fn subscribe_errors(&self, listener: Box<dyn ApiErrorListener>) -> u64 {
        self.bus
            .subscribe(move |error| listener.on_error(error.into()))
            .value()
    }

    pub fn unsubscribe_errors(&self, subscription: u64) -> bool {
        self.bus.unsubscribe(subscription.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// Sign-in portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiPortal {
    Patient,
    Admin,
}

impl From<FfiPortal> for Portal {
    fn from(portal: FfiPortal) -> Self {
        match portal {
            FfiPortal::Patient => Portal::Patient,
            FfiPortal::Admin => Portal::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiDestination {
    Loading,
    Login,
    PatientHome,
    AdminDashboard,
}

impl From<Destination> for FfiDestination {
    fn from(destination: Destination) -> Self {
        match destination {
            Destination::Loading => FfiDestination::Loading,
            Destination::Login => FfiDestination::Login,
            Destination::PatientHome => FfiDestination::PatientHome,
            Destination::AdminDashboard => FfiDestination::AdminDashboard,
        }
    }
}

/// FFI-safe session snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSessionSnapshot {
    pub destination: FfiDestination,
    pub authenticated: bool,
    pub returning_user: bool,
    /// "admin" or "customer"
    pub role: Option<String>,
    pub role_display: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

impl From<SessionSnapshot> for FfiSessionSnapshot {
    fn from(snapshot: SessionSnapshot) -> Self {
        let user = snapshot.user.as_ref();
        Self {
            destination: snapshot.destination().into(),
            authenticated: snapshot.is_authenticated(),
            returning_user: snapshot.returning_user,
            role: snapshot.role().map(|r| r.as_str().to_string()),
            role_display: snapshot.role_display().to_string(),
            user_id: user.map(|u| u.id.clone()),
            user_name: user.and_then(|u| u.full_name.clone()),
            user_email: user.and_then(|u| u.email.clone()),
        }
    }
}

/// FFI-safe service request, with display strings in the client's offset.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiServiceRequest {
    pub id: String,
    pub patient_name: String,
    pub service_label: String,
    pub service_code: String,
    pub status: String,
    pub status_label: String,
    pub date: String,
    pub time: String,
    pub address: String,
    /// "accept", "complete", or none
    pub available_action: Option<String>,
}

impl FfiServiceRequest {
    fn new(request: &ServiceRequest, offset: FixedOffset) -> Self {
        Self {
            id: request.id.clone(),
            patient_name: request.patient_name.clone(),
            service_label: request.service.label().to_string(),
            service_code: request.service.code().to_string(),
            status: request.status.as_str().to_string(),
            status_label: request.status.label().to_string(),
            date: request.display_date(offset),
            time: request.display_time(offset),
            address: request.address.clone(),
            available_action: request.available_action().map(|a| {
                match a {
                    RequestAction::Accept => "accept",
                    RequestAction::Complete => "complete",
                }
                .to_string()
            }),
        }
    }
}

/// FFI-safe normalized API error.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiApiError {
    pub message: String,
    pub code: String,
    pub status: Option<u16>,
    /// Raw response body as JSON text
    pub details: Option<String>,
}

impl From<&ApiError> for FfiApiError {
    fn from(error: &ApiError) -> Self {
        Self {
            message: error::error_message(error),
            code: error.code.to_string(),
            status: error.status,
            details: error.details.as_ref().map(|d| d.to_string()),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStatusCounts {
    pub pending: u32,
    pub accepted: u32,
    pub completed: u32,
    pub total: u32,
}

impl From<StatusCounts> for FfiStatusCounts {
    fn from(counts: StatusCounts) -> Self {
        Self {
            pending: counts.pending,
            accepted: counts.accepted,
            completed: counts.completed,
            total: counts.total(),
        }
    }
}

/// FFI-safe request form contents.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRequestForm {
    pub patient_name: String,
    pub service_label: String,
    pub address: String,
    pub date: String,
    pub time: String,
}

impl From<RequestForm> for FfiRequestForm {
    fn from(form: RequestForm) -> Self {
        Self {
            patient_name: form.patient_name,
            service_label: form.service.label().to_string(),
            address: form.address,
            date: form.date,
            time: form.time,
        }
    }
}

/// Admin list filters; unset fields are not sent.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiRequestFilters {
    pub status: Option<String>,
    pub service_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl From<FfiRequestFilters> for RequestFilters {
    fn from(filters: FfiRequestFilters) -> Self {
        RequestFilters {
            status: filters.status,
            service_type: filters.service_type,
            start_date: filters.start_date,
            end_date: filters.end_date,
            sort_by: filters.sort_by,
            sort_order: filters.sort_order,
        }
    }
}
