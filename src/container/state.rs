//! Container state resolution against an expected image

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::ContainerInfo;

/// Decides whether an image reference is the one an operator expects
pub trait ImageMatcher: Send + Sync {
    fn matches(&self, image: &str) -> bool;
}

/// Unanchored regular-expression match
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    pattern: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            Error::usage("container-state", format!("invalid image pattern: {}", e))
        })?;
        Ok(Self { pattern })
    }
}

impl ImageMatcher for RegexMatcher {
    fn matches(&self, image: &str) -> bool {
        self.pattern.is_match(image)
    }
}

/// Literal string equality
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    image: String,
}

impl ExactMatcher {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl ImageMatcher for ExactMatcher {
    fn matches(&self, image: &str) -> bool {
        self.image == image
    }
}

/// Report a container's state, or why its image is not the expected one.
///
/// Without a matcher the daemon's state string is returned as is. With one,
/// either the resolved or the configured image must match.
pub fn resolve_state(info: &ContainerInfo, matcher: Option<&dyn ImageMatcher>) -> String {
    let Some(matcher) = matcher else {
        return info.state.clone();
    };

    if matcher.matches(&info.image) || matcher.matches(&info.config_image) {
        return info.state.clone();
    }

    if info.running {
        format!("running image mismatch: {}", info.config_image)
    } else {
        format!("image mismatch: {}", info.config_image)
    }
}
