//! Session-token authority with reconnect grace timers.
//!
//! A token enters the authorized set at login and leaves it on logout or
//! when its grace timer fires after a disconnect. Timers are owned,
//! cancellable tasks: at most one per token, cancelled by a reconnect.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::task::JoinHandle;
use tracing::info;

/// Owns the authorized-token set and the disconnect-timer table.
#[derive(Debug)]
pub struct TokenAuthority {
    authorized: Arc<DashSet<String>>,
    timers: Arc<DashMap<String, JoinHandle<()>>>,
    grace_period: Duration,
}

impl TokenAuthority {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            authorized: Arc::new(DashSet::new()),
            timers: Arc::new(DashMap::new()),
            grace_period,
        }
    }

    /// Add a freshly minted token to the authorized set.
    pub fn authorize(&self, token: String) {
        self.authorized.insert(token);
    }

    /// Whether a token may open a shell channel.
    pub fn is_authorized(&self, token: &str) -> bool {
        self.authorized.contains(token)
    }

    /// Remove a token immediately (explicit logout), cancelling any
    /// pending grace timer.
    pub fn revoke(&self, token: &str) {
        self.cancel_revocation(token);
        self.authorized.remove(token);
    }

    /// Start the reconnect grace window for a token. If a timer is
    /// already pending for the token it is replaced, keeping at most one
    /// live timer per token. The timer fires once: it removes the token
    /// from the authorized set and its own table entry.
    pub fn schedule_revocation(&self, token: String) {
        let authorized = Arc::clone(&self.authorized);
        let timers = Arc::clone(&self.timers);
        let grace_period = self.grace_period;
        let timer_token = token.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            timers.remove(&timer_token);
            authorized.remove(&timer_token);
            info!("session token purged after grace window");
        });
        if let Some(previous) = self.timers.insert(token, handle) {
            previous.abort();
        }
    }

    /// Cancel a pending grace timer; the token stays authorized. Called
    /// when the same token reconnects inside the window.
    pub fn cancel_revocation(&self, token: &str) {
        if let Some((_, handle)) = self.timers.remove(token) {
            handle.abort();
        }
    }
}
