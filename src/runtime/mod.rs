//! Runtime client facade
//!
//! The orchestration code talks to the container daemon only through
//! [`RuntimeClient`]. Production uses [`DockerClient`]; tests use the
//! generated `MockRuntimeClient`.

mod docker;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ContainerHandle, ContainerInfo, ContainerSpec, HostSettings, RemoveOptions};

pub use docker::DockerClient;

/// Operations weaveutil needs from the container daemon.
///
/// Implementations tag every error with the operation name and target.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo>;

    /// Returns the image id
    async fn inspect_image(&self, id: &str) -> Result<String>;

    /// Ids of all containers, including stopped ones, carrying `label`
    async fn list_containers(&self, label: &str) -> Result<Vec<String>>;

    async fn create_container(
        &self,
        spec: &ContainerSpec,
        host: &HostSettings,
    ) -> Result<ContainerHandle>;

    async fn start_container(&self, handle: &ContainerHandle, host: &HostSettings) -> Result<()>;

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<()>;

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()>;

    async fn remove_container(&self, id: &str, options: RemoveOptions) -> Result<()>;

    /// Collect stdout and stderr until the container's process exits
    async fn attach_capture(&self, handle: &ContainerHandle) -> Result<Vec<u8>>;

    async fn pull_image(&self, image: &str, tag: &str) -> Result<()>;
}
