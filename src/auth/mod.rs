//! Authentication and session-token authority.
//!
//! Credential verification is a thin wrapper over bcrypt; authorization
//! state is an in-memory token set with per-token revocation timers for
//! the reconnect grace window.

mod gate;
mod middleware;
mod tokens;

pub use gate::{CredentialRecord, IdentityGate};
pub use middleware::{AUTH_COOKIE, FLAVOR_COOKIE, require_session};
pub use tokens::TokenAuthority;
