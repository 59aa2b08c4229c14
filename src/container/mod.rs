//! Container management module for weaveutil
//!
//! Handles all interactions with the container daemon including:
//! - Creating and starting containers from a parsed spec
//! - Version probes in throwaway containers
//! - Reporting container state against an expected image
//! - Stopping, killing and removing containers

mod manager;
mod probe;
pub mod state;

pub use manager::ContainerManager;
pub use state::{resolve_state, ExactMatcher, ImageMatcher, RegexMatcher};
