//! Session snapshot types.

use crate::models::{Role, UserProfile};

/// Where the auth state machine currently is.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// Storage has not been read yet
    #[default]
    Uninitialized,
    /// Storage read in progress
    Loading,
    /// A valid session exists. The role may be missing from storage.
    Authenticated { role: Option<Role> },
    Unauthenticated,
}

/// Screen the shell should show for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Loading,
    Login,
    PatientHome,
    AdminDashboard,
}

/// Everything the shell needs to render session-dependent UI.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub state: AuthState,
    /// Cached profile; present even when the session has expired
    pub user: Option<UserProfile>,
    /// A token and login timestamp were found (or just written)
    pub returning_user: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated { .. })
    }

    /// Role of the authenticated session. `None` when signed out.
    pub fn role(&self) -> Option<Role> {
        match self.state {
            AuthState::Authenticated { role } => role,
            _ => None,
        }
    }

    pub fn destination(&self) -> Destination {
        match self.state {
            AuthState::Uninitialized | AuthState::Loading => Destination::Loading,
            AuthState::Unauthenticated => Destination::Login,
            AuthState::Authenticated { role: None } => Destination::Login,
            AuthState::Authenticated {
                role: Some(Role::Customer),
            } => Destination::PatientHome,
            AuthState::Authenticated {
                role: Some(Role::Admin),
            } => Destination::AdminDashboard,
        }
    }

    /// "Doctor" for admins, "Patient" for everyone else.
    pub fn role_display(&self) -> &'static str {
        self.role().unwrap_or(Role::Customer).display_name()
    }
}
