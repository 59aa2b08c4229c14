//! Container lifecycle management

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{ContainerSpec, ImageReference, RemoveOptions};
use crate::runtime::RuntimeClient;

use super::state::{resolve_state, ImageMatcher};

/// Sequences daemon calls for each weaveutil subcommand
pub struct ContainerManager<C> {
    /// Daemon facade
    pub(super) client: C,

    /// Grace period handed to the daemon on stop
    stop_timeout_secs: i64,

    /// Signal sent on kill
    kill_signal: String,

    /// Marker variable injected into version probes
    pub(super) probe_env: String,
}

impl<C: RuntimeClient> ContainerManager<C> {
    pub fn new(client: C, config: &AppConfig) -> Self {
        Self {
            client,
            stop_timeout_secs: i64::from(config.stop_timeout_secs),
            kill_signal: config.kill_signal.clone(),
            probe_env: config.probe_env.clone(),
        }
    }

    /// Resolve a name or short id to the full container id
    pub async fn container_id(&self, name_or_id: &str) -> Result<String> {
        let info = self.client.inspect_container(name_or_id).await?;
        Ok(info.id)
    }

    /// State of a container, optionally checked against an expected image
    pub async fn container_state(
        &self,
        id: &str,
        matcher: Option<&dyn ImageMatcher>,
    ) -> Result<String> {
        let info = self.client.inspect_container(id).await?;
        Ok(resolve_state(&info, matcher))
    }

    /// `<hostname>.<domainname>` of a container
    pub async fn container_fqdn(&self, id: &str) -> Result<String> {
        let info = self.client.inspect_container(id).await?;
        Ok(info.fqdn())
    }

    /// Ids of all containers carrying `label`, stopped ones included
    pub async fn list_containers(&self, label: &str) -> Result<Vec<String>> {
        self.client.list_containers(label).await
    }

    /// Create and start a container, returning its id.
    ///
    /// A container whose start fails is left in place for the operator.
    pub async fn run(&self, spec: &ContainerSpec) -> Result<String> {
        let host = spec.host_settings();

        let handle = self.client.create_container(spec, &host).await?;
        debug!(container = %handle, image = %spec.image(), "Container created");

        self.client.start_container(&handle, &host).await?;
        info!(container = %handle, image = %spec.image(), "Container started");

        Ok(handle.into_id())
    }

    /// Stop each container in turn, halting at the first failure
    pub async fn stop_containers(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.client.stop_container(id, self.stop_timeout_secs).await?;
            info!(container = %id, "Container stopped");
        }
        Ok(())
    }

    /// Kill each container in turn, halting at the first failure
    pub async fn kill_containers(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.client.kill_container(id, &self.kill_signal).await?;
            info!(container = %id, signal = %self.kill_signal, "Container killed");
        }
        Ok(())
    }

    /// Remove each container in turn, halting at the first failure
    pub async fn remove_containers(&self, ids: &[String], options: RemoveOptions) -> Result<()> {
        for id in ids {
            self.client.remove_container(id, options).await?;
            info!(container = %id, "Container removed");
        }
        Ok(())
    }

    pub async fn pull_image(&self, reference: &ImageReference) -> Result<()> {
        self.client
            .pull_image(&reference.repository, &reference.tag)
            .await?;
        info!(image = %reference.repository, tag = %reference.tag, "Image pulled");
        Ok(())
    }
}
