//! Container lifecycle manager.
//!
//! `DockerRuntime` drives the Docker Engine API: create, attach the
//! combined stdio stream, start, and later kill + remove. Teardown is
//! best-effort on every step; a failed kill never prevents the removal
//! attempt.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    AttachContainerOptionsBuilder, CreateContainerOptionsBuilder, KillContainerOptionsBuilder,
    RemoveContainerOptionsBuilder, ResizeContainerTTYOptionsBuilder, StartContainerOptions,
    UploadToContainerOptionsBuilder,
};
use bollard::{API_DEFAULT_VERSION, Docker, body_full, errors::Error as BollardError};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::ContainerError;
use super::flavor::FlavorSpec;

/// Byte stream coming out of the container's attached pseudo-terminal.
pub type ShellOutput = BoxStream<'static, Result<Bytes, ContainerError>>;

/// Write half of the container's attached pseudo-terminal.
pub type ShellInput = Pin<Box<dyn AsyncWrite + Send>>;

/// A freshly started container together with its attached stream halves.
pub struct AttachedShell {
    /// Runtime identifier of the container.
    pub container_id: String,
    /// Combined stdout/stderr of the attached TTY.
    pub output: ShellOutput,
    /// Stdin of the attached TTY.
    pub input: ShellInput,
}

/// Container lifecycle operations used by the orchestrator.
///
/// Kept as a trait so tests can substitute a mock without a daemon.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container for the flavor, attach its stdio stream, and
    /// start it, in that order.
    async fn spawn(&self, spec: &FlavorSpec) -> Result<AttachedShell, ContainerError>;

    /// Force-kill then remove the container. Both steps are attempted
    /// unconditionally; failures are logged, never returned.
    async fn teardown(&self, container_id: &str);

    /// Upload a gzipped tar archive into the container filesystem at
    /// `destination`.
    async fn inject_file(
        &self,
        container_id: &str,
        archive: &Path,
        destination: &str,
    ) -> Result<(), ContainerError>;

    /// Propagate new terminal dimensions to the container TTY. Best-effort.
    async fn resize(&self, container_id: &str, cols: u16, rows: u16);
}

/// `ContainerRuntime` backed by a local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

/// Connection timeout for the daemon socket, in seconds.
const DOCKER_TIMEOUT_SECS: u64 = 120;

impl DockerRuntime {
    /// Connect to the daemon, optionally through an explicit socket path.
    pub fn connect(socket: Option<&str>) -> Result<Self, ContainerError> {
        let docker = match socket {
            Some(path) => Docker::connect_with_socket(path, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|err| ContainerError::Provisioning(format!("connecting to docker: {err}")))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn spawn(&self, spec: &FlavorSpec) -> Result<AttachedShell, ContainerError> {
        let name = format!("dockterm-{}", Uuid::new_v4().simple());
        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(vec![spec.command.clone()]),
            open_stdin: Some(true),
            tty: Some(true),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptionsBuilder::new().name(&name).build()),
                body,
            )
            .await
            .map_err(|err| ContainerError::Provisioning(format!("creating container: {err}")))?;
        let container_id = created.id;

        // Attach before start so no early output is lost.
        let attach = self
            .docker
            .attach_container(
                &container_id,
                Some(
                    AttachContainerOptionsBuilder::new()
                        .stream(true)
                        .stdin(true)
                        .stdout(true)
                        .stderr(true)
                        .build(),
                ),
            )
            .await
            .map_err(|err| ContainerError::Provisioning(format!("attaching container: {err}")))?;

        if let Err(err) = self
            .docker
            .start_container(&container_id, None::<StartContainerOptions>)
            .await
        {
            // Do not leak the created container when start fails.
            self.remove_container(&container_id).await;
            return Err(ContainerError::Provisioning(format!(
                "starting container: {err}"
            )));
        }

        info!(%container_id, image = %spec.image, "container started");

        let output = attach
            .output
            .map(|chunk| {
                chunk
                    .map(LogOutput::into_bytes)
                    .map_err(|err| ContainerError::Stream(err.to_string()))
            })
            .boxed();

        Ok(AttachedShell {
            container_id,
            output,
            input: attach.input,
        })
    }

    async fn teardown(&self, container_id: &str) {
        if let Err(err) = self
            .docker
            .kill_container(
                container_id,
                Some(KillContainerOptionsBuilder::new().signal("SIGKILL").build()),
            )
            .await
        {
            warn!(container_id, "killing container: {err}");
        }
        self.remove_container(container_id).await;
    }

    async fn inject_file(
        &self,
        container_id: &str,
        archive: &Path,
        destination: &str,
    ) -> Result<(), ContainerError> {
        let bytes = tokio::fs::read(archive)
            .await
            .map_err(|err| ContainerError::Injection(format!("reading archive: {err}")))?;
        self.docker
            .upload_to_container(
                container_id,
                Some(UploadToContainerOptionsBuilder::new().path(destination).build()),
                body_full(bytes.into()),
            )
            .await
            .map_err(|err| ContainerError::Injection(err.to_string()))
    }

    async fn resize(&self, container_id: &str, cols: u16, rows: u16) {
        if let Err(err) = self
            .docker
            .resize_container_tty(
                container_id,
                ResizeContainerTTYOptionsBuilder::new()
                    .w(i32::from(cols))
                    .h(i32::from(rows))
                    .build(),
            )
            .await
        {
            debug!(container_id, cols, rows, "resizing container tty: {err}");
        }
    }
}

impl DockerRuntime {
    async fn remove_container(&self, container_id: &str) {
        match self
            .docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptionsBuilder::new().force(true).v(true).build()),
            )
            .await
        {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => warn!(container_id, "removing container: {err}"),
        }
    }
}

fn is_not_found(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError { status_code, .. } if *status_code == 404
    )
}
