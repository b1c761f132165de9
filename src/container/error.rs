//! Container runtime error types.

use thiserror::Error;

/// Errors surfaced by the container lifecycle manager.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The requested shell flavor is not part of the closed flavor set.
    #[error("unknown shell flavor: {0}")]
    UnknownFlavor(String),

    /// The runtime rejected container creation, attach, or start.
    #[error("container provisioning failed: {0}")]
    Provisioning(String),

    /// File delivery into the container failed.
    #[error("file injection failed: {0}")]
    Injection(String),

    /// The attached stream reported a transport-level error.
    #[error("container stream error: {0}")]
    Stream(String),
}
