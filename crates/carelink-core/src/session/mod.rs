//! Session store: the auth state machine.
//!
//! A single instance is shared by everything that needs the session. It owns
//! the persisted session keys, decides at launch whether the stored session is
//! still valid, and publishes every change through a `watch` channel.
//!
//! ```text
//! Uninitialized ──initialize──▶ Loading ──▶ Authenticated { role }
//!                                      └──▶ Unauthenticated
//!
//! login / register ──▶ Authenticated { role }
//! logout           ──▶ Unauthenticated
//! ```

mod state;

pub use state::*;

use std::sync::Arc;

use carelink_wire::{AuthResponse, Credentials, Portal, RegistrationPayload};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{ClientConfig, ExpiredCleanup};
use crate::db::{
    DbError, SecureStore, AUTH_TOKEN_KEY, LAST_LOGIN_KEY, SESSION_KEYS, USER_ID_KEY, USER_KEY,
    USER_TYPE_KEY,
};
use crate::error::{ApiError, ApiErrorCode};
use crate::gateway::Gateway;
use crate::models::{Role, UserProfile};
use crate::validation::{validate_login, validate_registration, ValidationError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend rejected the attempt; `message` is the user-facing text
    #[error("{message}")]
    Auth {
        message: String,
        #[source]
        error: ApiError,
    },

    #[error("Failed to save session: {0}")]
    Storage(#[from] DbError),

    #[error("Failed to encode profile: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SessionError {
    fn auth(error: ApiError) -> Self {
        SessionError::Auth {
            message: login_failure_message(&error),
            error,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// User-facing text for a failed sign-in.
pub fn login_failure_message(error: &ApiError) -> String {
    match error.code {
        ApiErrorCode::Http(400) | ApiErrorCode::Http(401) => {
            "Invalid email or password. Please try again.".into()
        }
        ApiErrorCode::Http(404) => {
            "No account found with this email. Please check your email or register.".into()
        }
        ApiErrorCode::NetworkError => {
            "Network error. Please check your connection and try again.".into()
        }
        _ => error.message.clone(),
    }
}

pub struct SessionStore {
    store: Arc<dyn SecureStore>,
    gateway: Arc<Gateway>,
    ttl: chrono::Duration,
    cleanup: ExpiredCleanup,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn SecureStore>, gateway: Arc<Gateway>, config: &ClientConfig) -> Self {
        Self::with_policy(store, gateway, config.session_ttl(), config.expired_cleanup)
    }

    pub fn with_policy(
        store: Arc<dyn SecureStore>,
        gateway: Arc<Gateway>,
        ttl: chrono::Duration,
        cleanup: ExpiredCleanup,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            store,
            gateway,
            ttl,
            cleanup,
            state,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Restore the session persisted by a previous launch.
    pub fn initialize(&self) -> SessionSnapshot {
        self.initialize_at(Utc::now())
    }

    /// [`initialize`](Self::initialize) with an explicit clock.
    pub fn initialize_at(&self, now: DateTime<Utc>) -> SessionSnapshot {
        self.publish(SessionSnapshot {
            state: AuthState::Loading,
            ..self.snapshot()
        });

        let token = self.read(AUTH_TOKEN_KEY);
        let last_login = self.read(LAST_LOGIN_KEY);
        let role = self.read(USER_TYPE_KEY).and_then(|r| Role::parse(&r));
        let user = self.read(USER_KEY).and_then(|raw| {
            serde_json::from_str::<UserProfile>(&raw)
                .map_err(|e| tracing::warn!(error = %e, "Discarding unreadable cached profile"))
                .ok()
        });

        let snapshot = match (token, last_login) {
            (Some(_), Some(last_login)) => {
                if self.is_fresh(&last_login, now) {
                    tracing::info!(role = ?role, "Restored session");
                    SessionSnapshot {
                        state: AuthState::Authenticated { role },
                        user,
                        returning_user: true,
                    }
                } else {
                    tracing::info!(last_login = %last_login, "Stored session expired");
                    self.clear_expired();
                    SessionSnapshot {
                        state: AuthState::Unauthenticated,
                        user,
                        returning_user: true,
                    }
                }
            }
            _ => {
                tracing::debug!("No stored session");
                SessionSnapshot {
                    state: AuthState::Unauthenticated,
                    user,
                    returning_user: false,
                }
            }
        };

        self.publish(snapshot.clone());
        snapshot
    }

    pub async fn login(
        &self,
        portal: Portal,
        email: &str,
        password: &str,
    ) -> SessionResult<SessionSnapshot> {
        validate_login(email, password)?;

        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth = self
            .gateway
            .login(portal, &credentials)
            .await
            .map_err(SessionError::auth)?;

        self.persist_auth_at(Role::for_portal(portal), &auth, Utc::now())
    }

    /// Create an account and sign in with it.
    pub async fn register(
        &self,
        portal: Portal,
        payload: &RegistrationPayload,
    ) -> SessionResult<SessionSnapshot> {
        validate_registration(payload)?;

        let auth = self
            .gateway
            .register(portal, payload)
            .await
            .map_err(SessionError::auth)?;

        self.persist_auth_at(Role::for_portal(portal), &auth, Utc::now())
    }

    /// Write a successful auth response to storage and publish the new session.
    ///
    /// Keys are written one at a time; a failed write leaves the earlier ones
    /// in place and the in-memory state unchanged.
    pub fn persist_auth_at(
        &self,
        role: Role,
        auth: &AuthResponse,
        now: DateTime<Utc>,
    ) -> SessionResult<SessionSnapshot> {
        let profile = serde_json::to_string(&auth.user)?;

        self.store.set_item(AUTH_TOKEN_KEY, &auth.tokens.access.token)?;
        self.store.set_item(LAST_LOGIN_KEY, &now.to_rfc3339())?;
        self.store.set_item(USER_TYPE_KEY, role.as_str())?;
        self.store.set_item(USER_KEY, &profile)?;
        self.store.set_item(USER_ID_KEY, &auth.user.id)?;

        tracing::info!(role = %role, user_id = %auth.user.id, "Signed in");

        let snapshot = SessionSnapshot {
            state: AuthState::Authenticated { role: Some(role) },
            user: Some(auth.user.clone()),
            returning_user: true,
        };
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Delete every session key and sign out. Storage failures are logged only.
    pub fn logout(&self) {
        for key in SESSION_KEYS {
            if let Err(e) = self.store.delete_item(key) {
                tracing::warn!(key, error = %e, "Failed to delete session key");
            }
        }
        tracing::info!("Signed out");

        self.publish(SessionSnapshot {
            state: AuthState::Unauthenticated,
            user: None,
            returning_user: false,
        });
    }

    fn is_fresh(&self, last_login: &str, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(last_login) {
            Ok(at) => now.signed_duration_since(at.with_timezone(&Utc)) < self.ttl,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable login timestamp");
                false
            }
        }
    }

    fn clear_expired(&self) {
        let keys: &[&str] = match self.cleanup {
            ExpiredCleanup::Credentials => &[AUTH_TOKEN_KEY, LAST_LOGIN_KEY],
            ExpiredCleanup::Everything => &SESSION_KEYS,
        };
        for key in keys {
            if let Err(e) = self.store.delete_item(key) {
                tracing::warn!(key, error = %e, "Failed to delete expired session key");
            }
        }
    }

    /// Read a key, treating failures and empty values as absent.
    fn read(&self, key: &str) -> Option<String> {
        match self.store.get_item(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read session key");
                None
            }
        }
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        self.state.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FlakyStore, SqliteStore};
    use crate::error::{ErrorBus, TransportFailure};
    use crate::gateway::MockTransport;
    use carelink_wire::parse_auth_response;
    use std::sync::atomic::Ordering;
    use serde_json::json;

    struct Harness {
        store: Arc<SqliteStore>,
        transport: Arc<MockTransport>,
        session: SessionStore,
    }

    fn harness(cleanup: ExpiredCleanup) -> Harness {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let transport = Arc::new(MockTransport::new());
        let gateway = Arc::new(Gateway::with_bus(
            store.clone(),
            transport.clone(),
            Arc::new(ErrorBus::new()),
        ));
        let session =
            SessionStore::with_policy(store.clone(), gateway, chrono::Duration::days(7), cleanup);
        Harness {
            store,
            transport,
            session,
        }
    }

    fn auth_body() -> serde_json::Value {
        json!({
            "user": {"_id": "u1", "fullName": "Jane Doe", "email": "jane@example.com"},
            "tokens": {"access": {"token": "tok-1", "expires": "2030-01-01T00:00:00Z"}}
        })
    }

    fn seed(store: &SqliteStore, last_login: &str) {
        store.set_item(AUTH_TOKEN_KEY, "tok").unwrap();
        store.set_item(LAST_LOGIN_KEY, last_login).unwrap();
        store.set_item(USER_TYPE_KEY, "admin").unwrap();
        store.set_item(USER_KEY, r#"{"_id":"a1","fullName":"Dr. Smith"}"#).unwrap();
    }

    fn flaky() -> (Arc<FlakyStore>, SessionStore) {
        let store = Arc::new(FlakyStore::new());
        let gateway = Arc::new(Gateway::with_bus(
            store.clone(),
            Arc::new(MockTransport::new()),
            Arc::new(ErrorBus::new()),
        ));
        let session = SessionStore::with_policy(
            store.clone(),
            gateway,
            chrono::Duration::days(7),
            ExpiredCleanup::Credentials,
        );
        (store, session)
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_empty_storage_is_unauthenticated() {
        let h = harness(ExpiredCleanup::Credentials);
        assert_eq!(h.session.snapshot().destination(), Destination::Loading);

        let snapshot = h.session.initialize_at(now());
        assert_eq!(snapshot.state, AuthState::Unauthenticated);
        assert!(!snapshot.returning_user);
        assert!(snapshot.user.is_none());
    }

    #[test]
    fn test_fresh_session_restores_role_and_profile() {
        let h = harness(ExpiredCleanup::Credentials);
        seed(&h.store, "2025-03-05T12:00:00Z");

        let snapshot = h.session.initialize_at(now());
        assert_eq!(
            snapshot.state,
            AuthState::Authenticated {
                role: Some(Role::Admin)
            }
        );
        assert!(snapshot.returning_user);
        assert_eq!(
            snapshot.user.unwrap().full_name.as_deref(),
            Some("Dr. Smith")
        );
        assert_eq!(h.session.snapshot().destination(), Destination::AdminDashboard);
    }

    #[test]
    fn test_expired_session_clears_credentials_only() {
        let h = harness(ExpiredCleanup::Credentials);
        seed(&h.store, "2025-03-03T12:00:00Z");

        let snapshot = h.session.initialize_at(now());
        assert_eq!(snapshot.state, AuthState::Unauthenticated);
        assert!(snapshot.returning_user);
        assert!(snapshot.user.is_some());

        assert_eq!(h.store.get_item(AUTH_TOKEN_KEY).unwrap(), None);
        assert_eq!(h.store.get_item(LAST_LOGIN_KEY).unwrap(), None);
        assert_eq!(h.store.get_item(USER_TYPE_KEY).unwrap().as_deref(), Some("admin"));
        assert!(h.store.get_item(USER_KEY).unwrap().is_some());
    }

    #[test]
    fn test_expired_session_clears_everything() {
        let h = harness(ExpiredCleanup::Everything);
        seed(&h.store, "2025-01-01T00:00:00Z");

        h.session.initialize_at(now());
        for key in SESSION_KEYS {
            assert_eq!(h.store.get_item(key).unwrap(), None);
        }
    }

    #[test]
    fn test_unparseable_timestamp_counts_as_expired() {
        let h = harness(ExpiredCleanup::Credentials);
        seed(&h.store, "yesterday");

        let snapshot = h.session.initialize_at(now());
        assert_eq!(snapshot.state, AuthState::Unauthenticated);
        assert_eq!(h.store.get_item(AUTH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_missing_role_routes_to_login() {
        let h = harness(ExpiredCleanup::Credentials);
        seed(&h.store, "2025-03-10T11:00:00Z");
        h.store.delete_item(USER_TYPE_KEY).unwrap();

        let snapshot = h.session.initialize_at(now());
        assert_eq!(snapshot.state, AuthState::Authenticated { role: None });
        assert_eq!(snapshot.destination(), Destination::Login);
    }

    #[tokio::test]
    async fn test_login_persists_and_notifies() {
        let h = harness(ExpiredCleanup::Credentials);
        h.session.initialize_at(now());
        let mut rx = h.session.subscribe();
        h.transport.push_response(auth_body());

        let snapshot = h
            .session
            .login(Portal::Patient, "jane@example.com", "secret")
            .await
            .unwrap();

        assert_eq!(snapshot.destination(), Destination::PatientHome);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().role(), Some(Role::Customer));

        assert_eq!(h.store.get_item(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
        assert_eq!(h.store.get_item(USER_TYPE_KEY).unwrap().as_deref(), Some("customer"));
        assert_eq!(h.store.get_item(USER_ID_KEY).unwrap().as_deref(), Some("u1"));
        assert!(h.store.get_item(LAST_LOGIN_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_validation_skips_network() {
        let h = harness(ExpiredCleanup::Credentials);

        let err = h.session.login(Portal::Admin, "", "x").await.unwrap_err();
        assert_eq!(err.to_string(), "Please fill in all fields");

        let err = h
            .session
            .login(Portal::Admin, "smith.example.com", "x")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid email address");
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_messages() {
        let h = harness(ExpiredCleanup::Credentials);
        h.transport.push_failure(TransportFailure::Status {
            status: 401,
            body: json!({"message": "bad credentials"}),
        });
        h.transport.push_failure(TransportFailure::Status {
            status: 404,
            body: json!({}),
        });
        h.transport.push_failure(TransportFailure::NoResponse {
            reason: "offline".into(),
        });

        let mut messages = Vec::new();
        for _ in 0..3 {
            let err = h
                .session
                .login(Portal::Patient, "jane@example.com", "secret")
                .await
                .unwrap_err();
            messages.push(err.to_string());
        }

        assert_eq!(
            messages,
            vec![
                "Invalid email or password. Please try again.",
                "No account found with this email. Please check your email or register.",
                "Network error. Please check your connection and try again.",
            ]
        );
        assert!(!h.session.snapshot().is_authenticated());
    }

    #[test]
    fn test_other_failures_keep_server_message() {
        let error = ApiError::new("Server error. Please try again.", ApiErrorCode::Http(500));
        assert_eq!(login_failure_message(&error), "Server error. Please try again.");
    }

    #[tokio::test]
    async fn test_register_signs_in() {
        let h = harness(ExpiredCleanup::Credentials);
        h.transport.push_response(auth_body());

        let payload = RegistrationPayload {
            full_name: "Dr. Smith".into(),
            email: "smith@example.com".into(),
            phone_number: "555-0100".into(),
            password: "secret".into(),
        };
        let snapshot = h.session.register(Portal::Admin, &payload).await.unwrap();

        assert_eq!(snapshot.destination(), Destination::AdminDashboard);
        assert_eq!(
            h.transport.last_request().unwrap().path,
            "/v1.0/auth/register/admin"
        );
    }

    #[test]
    fn test_logout_clears_everything() {
        let h = harness(ExpiredCleanup::Credentials);
        seed(&h.store, "2025-03-10T11:00:00Z");
        h.store.set_item(USER_ID_KEY, "a1").unwrap();
        h.session.initialize_at(now());

        h.session.logout();

        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.state, AuthState::Unauthenticated);
        assert!(snapshot.user.is_none());
        assert!(!snapshot.returning_user);
        for key in SESSION_KEYS {
            assert_eq!(h.store.get_item(key).unwrap(), None);
        }
    }

    #[test]
    fn test_unreadable_storage_starts_signed_out() {
        let (store, session) = flaky();
        let auth = parse_auth_response(&auth_body()).unwrap();
        session
            .persist_auth_at(Role::Admin, &auth, now() - chrono::Duration::days(1))
            .unwrap();
        store.fail_reads.store(true, Ordering::SeqCst);

        let snapshot = session.initialize_at(now());
        assert_eq!(snapshot.state, AuthState::Unauthenticated);
        assert!(!snapshot.returning_user);
        assert!(snapshot.user.is_none());
    }

    #[test]
    fn test_logout_survives_delete_failures() {
        let (store, session) = flaky();
        let auth = parse_auth_response(&auth_body()).unwrap();
        session.persist_auth_at(Role::Customer, &auth, now()).unwrap();
        store.fail_deletes.store(true, Ordering::SeqCst);

        session.logout();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, AuthState::Unauthenticated);
        assert!(snapshot.user.is_none());
        assert_eq!(snapshot.destination(), Destination::Login);
        // The failed deletes left the keys behind
        assert_eq!(store.get_item(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
    }
}
