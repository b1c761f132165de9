//! Container provisioning and teardown.
//!
//! Wraps the Docker Engine API behind a small trait so the rest of the
//! application (and the integration tests) never talk to the daemon
//! directly.

mod archive;
mod error;
mod flavor;
mod runtime;

pub use archive::{build_file_archive, remove_quietly};
pub use error::ContainerError;
pub use flavor::{Flavor, FlavorSpec, FlavorTable};
pub use runtime::{AttachedShell, ContainerRuntime, DockerRuntime, ShellInput, ShellOutput};
