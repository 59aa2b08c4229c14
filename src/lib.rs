//! weaveutil library
//!
//! Narrow container operations for an orchestration controller: inspect,
//! create, probe and reclaim containers on the local Docker daemon.

pub mod args;
pub mod config;
pub mod container;
pub mod error;
pub mod logging;
pub mod models;
pub mod runtime;

pub use container::ContainerManager;
pub use error::{Error, Result};
pub use models::{ContainerSpec, ImageReference};
pub use runtime::{DockerClient, RuntimeClient};
