//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{IdentityGate, TokenAuthority};
use crate::container::{ContainerRuntime, FlavorTable};
use crate::session::{AdmissionController, SessionRegistry};
use crate::ws::ChannelTable;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Credential verification.
    pub gate: Arc<IdentityGate>,
    /// Authorized-token set and grace timers.
    pub tokens: Arc<TokenAuthority>,
    /// Global connection cap.
    pub admission: Arc<AdmissionController>,
    /// Origin -> active session records.
    pub registry: Arc<SessionRegistry>,
    /// Open channels supervised by the liveness monitor.
    pub channels: Arc<ChannelTable>,
    /// Container lifecycle manager.
    pub runtime: Arc<dyn ContainerRuntime>,
    /// Flavor descriptors resolved at configuration load.
    pub flavors: Arc<FlavorTable>,
    /// Staging area for uploaded files and their archives.
    pub staging_dir: PathBuf,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        gate: IdentityGate,
        tokens: TokenAuthority,
        admission: AdmissionController,
        runtime: Arc<dyn ContainerRuntime>,
        flavors: FlavorTable,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            gate: Arc::new(gate),
            tokens: Arc::new(tokens),
            admission: Arc::new(admission),
            registry: Arc::new(SessionRegistry::new()),
            channels: Arc::new(ChannelTable::new()),
            runtime,
            flavors: Arc::new(flavors),
            staging_dir,
        }
    }
}
