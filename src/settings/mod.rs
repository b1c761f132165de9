//! Application configuration.
//!
//! Layered the usual way: compiled-in defaults, then the TOML config file,
//! then `DOCKTERM__*` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for overrides, e.g.
/// `DOCKTERM_SERVER__PORT=9000`.
const ENV_PREFIX: &str = "DOCKTERM";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub container: ContainerSettings,
    pub credentials: CredentialSettings,
    pub paths: PathsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Hard cap on simultaneously open shell channels.
    pub max_connections: usize,
    /// Seconds between liveness sweeps.
    pub heartbeat_interval_secs: u64,
    /// Seconds a disconnected token stays authorized for reconnection.
    pub grace_period_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_connections: 1,
            heartbeat_interval_secs: 30,
            grace_period_secs: 10,
        }
    }
}

impl SessionSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Explicit docker daemon socket path; local defaults when unset.
    pub socket: Option<String>,
    /// Per-flavor image overrides, keyed by flavor name.
    pub images: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Path to the credential record JSON (username + bcrypt hash).
    pub file: PathBuf,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from("credentials/user.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSettings {
    /// Staging area for uploaded files and their archives.
    pub staging_dir: PathBuf,
}

impl Default for PathsSettings {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("staging"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the config file (if present) and environment.
    pub fn load(config_file: &Path) -> Result<Self> {
        let built = Config::builder()
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("assembling configuration")?;
        built
            .try_deserialize()
            .context("deserializing configuration")
    }

    /// Write the default configuration as commented TOML.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let body = toml::to_string_pretty(&Settings::default())
            .context("serializing default configuration")?;
        let contents = format!("# Configuration for dockterm\n\n{body}");
        std::fs::write(path, contents)
            .with_context(|| format!("writing config file {}", path.display()))
    }
}
