//! Session admission and registry.

mod admission;
mod registry;

pub use admission::AdmissionController;
pub use registry::{ActiveSession, SessionRegistry};
