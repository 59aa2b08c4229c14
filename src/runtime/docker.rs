//! Docker Engine API implementation of the runtime client

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions,
    InspectContainerOptions, KillContainerOptions, ListContainersOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerState, HostConfig, RestartPolicy as DockerRestartPolicy, RestartPolicyNameEnum,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use tracing::{debug, trace};

use super::RuntimeClient;
use crate::error::{Error, Result};
use crate::models::{
    ContainerHandle, ContainerInfo, ContainerSpec, HostSettings, RemoveOptions, RestartPolicy,
};

/// Request timeout handed to bollard, in seconds
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// Runtime client backed by the local Docker daemon
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to the daemon at `docker_host`, or to the local defaults
    /// (`DOCKER_HOST`, then the standard unix socket) when unset.
    pub fn connect(docker_host: Option<&str>) -> Result<Self> {
        let target = docker_host.unwrap_or("local daemon");
        let docker = match docker_host {
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(host) => Docker::connect_with_http(host, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| Error::Connection {
            op: "connect to",
            target: target.to_string(),
            message: e.to_string(),
        })?;

        debug!(host = %target, "Docker client initialized");
        Ok(Self { docker })
    }
}

#[async_trait]
impl RuntimeClient for DockerClient {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo> {
        debug!(container = %id, "Inspecting container");
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| Error::from_docker("inspect container", id, e))?;

        let config = response.config.unwrap_or_default();
        let state = response.state.unwrap_or_default();

        Ok(ContainerInfo {
            id: response.id.unwrap_or_default(),
            image: response.image.unwrap_or_default(),
            config_image: config.image.unwrap_or_default(),
            running: state.running.unwrap_or(false),
            state: state_string(&state),
            hostname: config.hostname.unwrap_or_default(),
            domainname: config.domainname.unwrap_or_default(),
        })
    }

    async fn inspect_image(&self, id: &str) -> Result<String> {
        debug!(image = %id, "Inspecting image");
        let image = self
            .docker
            .inspect_image(id)
            .await
            .map_err(|e| Error::from_docker("inspect image", id, e))?;

        Ok(image.id.unwrap_or_else(|| id.to_string()))
    }

    async fn list_containers(&self, label: &str) -> Result<Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label.to_string()]);

        let options = ListContainersOptions::<String> {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| Error::from_docker("list containers by label", label, e))?;

        debug!(label = %label, count = containers.len(), "Listed containers");
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn create_container(
        &self,
        spec: &ContainerSpec,
        host: &HostSettings,
    ) -> Result<ContainerHandle> {
        let options = spec.name().map(|name| CreateContainerOptions {
            name: name.to_string(),
            ..Default::default()
        });

        let config = Config {
            image: Some(spec.image().to_string()),
            cmd: Some(spec.cmd().to_vec()),
            env: (!spec.env().is_empty()).then(|| spec.env().to_vec()),
            host_config: Some(host_config(host)),
            ..Default::default()
        };

        debug!(image = %spec.image(), cmd = ?spec.cmd(), name = ?spec.name(), "Creating container");
        let created = self
            .docker
            .create_container(options, config)
            .await
            .map_err(|e| Error::from_docker("create container from image", spec.image(), e))?;

        for warning in &created.warnings {
            debug!(container = %created.id, warning = %warning, "Daemon warning");
        }

        Ok(ContainerHandle::new(created.id))
    }

    async fn start_container(&self, handle: &ContainerHandle, host: &HostSettings) -> Result<()> {
        // Host settings were applied at create time.
        trace!(container = %handle, host = ?host, "Starting container");
        self.docker
            .start_container(handle.id(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::from_docker("start container", handle.id(), e))
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<()> {
        debug!(container = %id, timeout_secs, "Stopping container");
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: timeout_secs }))
            .await
            .map_err(|e| Error::from_docker("stop container", id, e))
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()> {
        debug!(container = %id, signal = %signal, "Killing container");
        let options = KillContainerOptions {
            signal: signal.to_string(),
        };
        self.docker
            .kill_container(id, Some(options))
            .await
            .map_err(|e| Error::from_docker("kill container", id, e))
    }

    async fn remove_container(&self, id: &str, options: RemoveOptions) -> Result<()> {
        debug!(
            container = %id,
            force = options.force,
            volumes = options.remove_volumes,
            "Removing container"
        );
        let options = RemoveContainerOptions {
            force: options.force,
            v: options.remove_volumes,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| Error::from_docker("remove container", id, e))
    }

    async fn attach_capture(&self, handle: &ContainerHandle) -> Result<Vec<u8>> {
        let options = AttachContainerOptions::<String> {
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            logs: Some(true),
            ..Default::default()
        };

        let AttachContainerResults { mut output, .. } = self
            .docker
            .attach_container(handle.id(), Some(options))
            .await
            .map_err(|e| Error::from_docker("attach to container", handle.id(), e))?;

        let mut captured = Vec::new();
        while let Some(chunk) = output.next().await {
            match chunk.map_err(|e| Error::from_docker("attach to container", handle.id(), e))? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message } => captured.extend_from_slice(&message),
                LogOutput::StdIn { .. } => {}
            }
        }

        debug!(container = %handle, bytes = captured.len(), "Attached stream closed");
        Ok(captured)
    }

    async fn pull_image(&self, image: &str, tag: &str) -> Result<()> {
        let target = format!("{}:{}", image, tag);
        let options = CreateImageOptions {
            from_image: image.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let progress = progress.map_err(|e| Error::from_docker("pull image", &target, e))?;
            if let Some(status) = progress.status {
                debug!(image = %target, status = %status, "Pull progress");
            }
        }

        Ok(())
    }
}

fn host_config(host: &HostSettings) -> HostConfig {
    HostConfig {
        network_mode: host.network_mode.clone(),
        pid_mode: host.pid_mode.clone(),
        privileged: Some(host.privileged),
        restart_policy: Some(restart_policy(host.restart_policy)),
        binds: (!host.binds.is_empty()).then(|| host.binds.clone()),
        volumes_from: (!host.volumes_from.is_empty()).then(|| host.volumes_from.clone()),
        auto_remove: Some(host.auto_remove),
        ..Default::default()
    }
}

fn restart_policy(policy: RestartPolicy) -> DockerRestartPolicy {
    let (name, maximum_retry_count) = match policy {
        RestartPolicy::Never => (RestartPolicyNameEnum::NO, None),
        RestartPolicy::Always => (RestartPolicyNameEnum::ALWAYS, None),
        RestartPolicy::UnlessStopped => (RestartPolicyNameEnum::UNLESS_STOPPED, None),
        RestartPolicy::OnFailure { max_retries } => {
            (RestartPolicyNameEnum::ON_FAILURE, Some(i64::from(max_retries)))
        }
    };
    DockerRestartPolicy {
        name: Some(name),
        maximum_retry_count,
    }
}

/// The daemon's status string, or one derived from the state flags when the
/// daemon leaves it out.
fn state_string(state: &ContainerState) -> String {
    if let Some(status) = state.status.as_ref().map(ToString::to_string) {
        if !status.is_empty() {
            return status;
        }
    }

    let flag = |f: Option<bool>| f.unwrap_or(false);
    if flag(state.running) {
        if flag(state.paused) {
            "paused"
        } else if flag(state.restarting) {
            "restarting"
        } else {
            "running"
        }
    } else if flag(state.dead) {
        "dead"
    } else {
        "exited"
    }
    .to_string()
}
