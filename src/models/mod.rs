//! Data models for weaveutil
//!
//! This module defines the container-creation descriptor and the values
//! exchanged with the runtime client.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Tag used when a pull reference has none
pub const DEFAULT_TAG: &str = "latest";

// ============================================================================
// Container Creation
// ============================================================================

/// Daemon-level restart directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    #[default]
    Never,
    Always,
    UnlessStopped,
    OnFailure {
        /// Zero means unlimited
        max_retries: u32,
    },
}

impl FromStr for RestartPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "no" | "never" => Ok(RestartPolicy::Never),
            "always" => Ok(RestartPolicy::Always),
            "unless-stopped" => Ok(RestartPolicy::UnlessStopped),
            "on-failure" => Ok(RestartPolicy::OnFailure { max_retries: 0 }),
            other => {
                let count = other
                    .strip_prefix("on-failure:")
                    .ok_or_else(|| {
                        Error::usage("run-container", format!("invalid restart policy: {}", other))
                    })?;
                let max_retries = count.parse::<u32>().map_err(|_| {
                    Error::usage(
                        "run-container",
                        format!("invalid restart retry count: {}", count),
                    )
                })?;
                Ok(RestartPolicy::OnFailure { max_retries })
            }
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::Never => write!(f, "no"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::UnlessStopped => write!(f, "unless-stopped"),
            RestartPolicy::OnFailure { max_retries: 0 } => write!(f, "on-failure"),
            RestartPolicy::OnFailure { max_retries } => write!(f, "on-failure:{}", max_retries),
        }
    }
}

/// Immutable description of a container to create.
///
/// Built once per invocation through [`ContainerSpecBuilder`]. The bind list
/// never holds two equal strings; every other list keeps input order and
/// duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    image: String,
    cmd: Vec<String>,
    env: Vec<String>,
    name: Option<String>,
    network_mode: Option<String>,
    pid_mode: Option<String>,
    privileged: bool,
    restart_policy: RestartPolicy,
    binds: Vec<String>,
    volumes_from: Vec<String>,
    auto_remove: bool,
}

impl ContainerSpec {
    pub fn builder(image: impl Into<String>) -> ContainerSpecBuilder {
        ContainerSpecBuilder::new(image)
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// `None` lets the daemon assign a name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn network_mode(&self) -> Option<&str> {
        self.network_mode.as_deref()
    }

    pub fn pid_mode(&self) -> Option<&str> {
        self.pid_mode.as_deref()
    }

    pub fn privileged(&self) -> bool {
        self.privileged
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    pub fn binds(&self) -> &[String] {
        &self.binds
    }

    pub fn volumes_from(&self) -> &[String] {
        &self.volumes_from
    }

    pub fn auto_remove(&self) -> bool {
        self.auto_remove
    }

    /// Host configuration used for both create and start
    pub fn host_settings(&self) -> HostSettings {
        HostSettings {
            network_mode: self.network_mode.clone(),
            pid_mode: self.pid_mode.clone(),
            privileged: self.privileged,
            restart_policy: self.restart_policy,
            binds: self.binds.clone(),
            volumes_from: self.volumes_from.clone(),
            auto_remove: self.auto_remove,
        }
    }
}

/// Accumulates the fields of a [`ContainerSpec`]
#[derive(Debug, Clone, Default)]
pub struct ContainerSpecBuilder {
    image: String,
    cmd: Vec<String>,
    env: Vec<String>,
    name: Option<String>,
    network_mode: Option<String>,
    pid_mode: Option<String>,
    privileged: bool,
    restart_policy: RestartPolicy,
    binds: Vec<String>,
    volumes_from: Vec<String>,
    auto_remove: bool,
}

impl ContainerSpecBuilder {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, var: impl Into<String>) -> Self {
        self.env.push(var.into());
        self
    }

    /// An empty name leaves naming to the daemon
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.is_empty()).then_some(name);
        self
    }

    pub fn network_mode(mut self, mode: impl Into<String>) -> Self {
        self.network_mode = Some(mode.into());
        self
    }

    pub fn pid_mode(mut self, mode: impl Into<String>) -> Self {
        self.pid_mode = Some(mode.into());
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Adds a bind unless the exact string is already present
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        let bind = bind.into();
        if !self.binds.contains(&bind) {
            self.binds.push(bind);
        }
        self
    }

    pub fn volumes_from(mut self, container: impl Into<String>) -> Self {
        self.volumes_from.push(container.into());
        self
    }

    pub fn auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    pub fn build(self) -> ContainerSpec {
        ContainerSpec {
            image: self.image,
            cmd: self.cmd,
            env: self.env,
            name: self.name,
            network_mode: self.network_mode,
            pid_mode: self.pid_mode,
            privileged: self.privileged,
            restart_policy: self.restart_policy,
            binds: self.binds,
            volumes_from: self.volumes_from,
            auto_remove: self.auto_remove,
        }
    }
}

/// Host-side configuration derived from a [`ContainerSpec`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostSettings {
    pub network_mode: Option<String>,
    pub pid_mode: Option<String>,
    pub privileged: bool,
    pub restart_policy: RestartPolicy,
    pub binds: Vec<String>,
    pub volumes_from: Vec<String>,
    pub auto_remove: bool,
}

/// Identifier of a created container, valid until it is removed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn into_id(self) -> String {
        self.0
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Inspection
// ============================================================================

/// The fields of an inspected container that weaveutil reports on
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerInfo {
    pub id: String,
    /// Image the container actually runs (usually a content digest)
    pub image: String,
    /// Image reference as written at creation time
    pub config_image: String,
    pub running: bool,
    /// Raw state string as reported by the daemon
    pub state: String,
    pub hostname: String,
    pub domainname: String,
}

impl ContainerInfo {
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.hostname, self.domainname)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveOptions {
    pub force: bool,
    pub remove_volumes: bool,
}

// ============================================================================
// Images
// ============================================================================

/// A pull reference split into repository and tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
    /// True when no tag was given and [`DEFAULT_TAG`] was substituted
    pub defaulted: bool,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.is_empty() {
            return Err(Error::usage("pull-image", "image name must not be empty"));
        }

        let invalid = || {
            Error::usage(
                "pull-image",
                format!("invalid image reference: {}", reference),
            )
        };

        // A digest pins the image; it is sent to the daemon in place of a tag.
        if let Some((repository, digest)) = reference.split_once('@') {
            if repository.is_empty() || !digest.contains(':') || digest.ends_with(':') {
                return Err(invalid());
            }
            return Ok(Self {
                repository: repository.to_string(),
                tag: digest.to_string(),
                defaulted: false,
            });
        }

        // A colon followed by a slash is a registry port, not a tag.
        match reference.rsplit_once(':') {
            Some((repository, tag)) if !tag.contains('/') => {
                if repository.is_empty() || tag.is_empty() {
                    return Err(invalid());
                }
                Ok(Self {
                    repository: repository.to_string(),
                    tag: tag.to_string(),
                    defaulted: false,
                })
            }
            _ => Ok(Self {
                repository: reference.to_string(),
                tag: DEFAULT_TAG.to_string(),
                defaulted: true,
            }),
        }
    }

    /// Progress lines printed before a pull starts
    pub fn pull_banner(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(2);
        if self.defaulted {
            lines.push(format!("Using default tag: {}", self.tag));
        }
        lines.push(format!("{}: Pulling from {}", self.tag, self.repository));
        lines
    }
}
