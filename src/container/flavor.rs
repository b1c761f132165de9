//! Shell flavor descriptors.
//!
//! A flavor selects which image a session container runs and which command
//! is attached as the interactive shell. The set is closed: unknown names
//! are rejected at parse time with a typed error instead of failing a map
//! lookup somewhere downstream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::ContainerError;

/// Supported shell flavors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Plain bash shell.
    #[default]
    Shell,
    /// Java REPL (jshell).
    Java,
    /// Node.js REPL.
    Node,
    /// Python REPL.
    Python,
}

impl Flavor {
    /// All members of the closed flavor set.
    pub fn all() -> [Flavor; 4] {
        [Flavor::Shell, Flavor::Java, Flavor::Node, Flavor::Python]
    }

    fn default_spec(&self) -> FlavorSpec {
        match self {
            Flavor::Shell => FlavorSpec::new("ubuntu", "/bin/bash"),
            Flavor::Java => FlavorSpec::new("adoptopenjdk:11.0.6_10-jdk-hotspot-bionic", "jshell"),
            Flavor::Node => FlavorSpec::new("node:lts-alpine", "node"),
            Flavor::Python => FlavorSpec::new("python:3.8-alpine", "python"),
        }
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flavor::Shell => write!(f, "shell"),
            Flavor::Java => write!(f, "java"),
            Flavor::Node => write!(f, "node"),
            Flavor::Python => write!(f, "python"),
        }
    }
}

impl std::str::FromStr for Flavor {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shell" => Ok(Flavor::Shell),
            "java" => Ok(Flavor::Java),
            "node" => Ok(Flavor::Node),
            "python" => Ok(Flavor::Python),
            other => Err(ContainerError::UnknownFlavor(other.to_string())),
        }
    }
}

/// Image and startup command for one flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorSpec {
    /// Container image reference.
    pub image: String,
    /// Command attached as the interactive shell.
    pub command: String,
}

impl FlavorSpec {
    fn new(image: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: command.into(),
        }
    }
}

/// Flavor descriptors resolved once at configuration load.
#[derive(Debug, Clone)]
pub struct FlavorTable {
    specs: HashMap<Flavor, FlavorSpec>,
}

impl FlavorTable {
    /// Build the table from the compiled-in defaults plus per-flavor image
    /// overrides from configuration.
    pub fn with_overrides(image_overrides: &HashMap<String, String>) -> Self {
        let mut specs = HashMap::new();
        for flavor in Flavor::all() {
            let mut spec = flavor.default_spec();
            if let Some(image) = image_overrides.get(&flavor.to_string()) {
                spec.image = image.clone();
            }
            specs.insert(flavor, spec);
        }
        Self { specs }
    }

    /// Descriptor for a flavor. Every member of the closed set is present.
    pub fn spec(&self, flavor: Flavor) -> &FlavorSpec {
        &self.specs[&flavor]
    }
}

impl Default for FlavorTable {
    fn default() -> Self {
        Self::with_overrides(&HashMap::new())
    }
}
