//! Origin-keyed registry of live sessions.

use dashmap::DashMap;
use tracing::warn;

use crate::container::Flavor;

/// Record of a running session for one client origin.
///
/// Created once the channel is admitted and its container has started;
/// removed when the channel closes. Never outlives one channel.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    /// Runtime identifier of the backing container.
    pub container_id: String,
    /// Flavor the container was provisioned with.
    pub flavor: Flavor,
}

/// Single source of truth for "is there a live session for this origin".
///
/// Duplicate registration for an origin is an invariant violation in the
/// caller (the admission cap should have prevented it); the policy here is
/// to warn and overwrite so lookups always point at the newest container.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, ActiveSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session for an origin.
    pub fn register(&self, origin: &str, session: ActiveSession) {
        if let Some(previous) = self.sessions.insert(origin.to_string(), session) {
            warn!(
                origin,
                stale_container = %previous.container_id,
                "replaced an existing session record for origin"
            );
        }
    }

    /// Session record for an origin, if one is live. Absence during
    /// provisioning means "not ready", not an error.
    pub fn lookup(&self, origin: &str) -> Option<ActiveSession> {
        self.sessions.get(origin).map(|entry| entry.value().clone())
    }

    /// Drop the record for an origin.
    pub fn unregister(&self, origin: &str) {
        self.sessions.remove(origin);
    }

    /// Remove and return every live record. Used at shutdown to tear down
    /// whatever is still running.
    pub fn drain(&self) -> Vec<(String, ActiveSession)> {
        let origins: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        origins
            .into_iter()
            .filter_map(|origin| self.sessions.remove(&origin))
            .collect()
    }
}
