//! Domain models for the CareLink client.

mod request;
mod role;

pub use request::*;
pub use role::*;

/// Cached profile of the signed-in user, exactly as the auth endpoint sent it.
pub use carelink_wire::AuthUser as UserProfile;
