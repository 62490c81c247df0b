//! User roles.

use std::fmt;

use carelink_wire::Portal;
use serde::{Deserialize, Serialize};

/// Role persisted alongside the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Admin/doctor
    Admin,
    /// Patient
    Customer,
}

impl Role {
    /// Value written to the `user_type` key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }

    /// Parse a stored role. Anything unrecognized (including "") is no role.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }

    /// Role granted by signing in through a portal.
    pub fn for_portal(portal: Portal) -> Self {
        match portal {
            Portal::Patient => Role::Customer,
            Portal::Admin => Role::Admin,
        }
    }

    /// Name shown on the settings screen.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Doctor",
            Role::Customer => "Patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
