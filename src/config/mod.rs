//! Configuration module for weaveutil
//!
//! Supports configuration via:
//! - YAML/TOML config files
//! - Environment variables (`WEAVEUTIL__LOG_LEVEL`, `WEAVEUTIL__DOCKER_HOST`, ...)
//! - The `--log-level` command line option

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Diagnostic output format on stderr
    #[serde(default)]
    pub log_format: LogFormat,

    /// Daemon address (`unix://...` or `tcp://...`); local defaults when unset
    #[serde(default)]
    pub docker_host: Option<String>,

    /// Grace period in seconds handed to the daemon by stop-container
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u32,

    /// Signal sent by kill-container
    #[serde(default = "default_kill_signal")]
    pub kill_signal: String,

    /// KEY=VALUE marker set in version probes to disable network side effects
    #[serde(default = "default_probe_env")]
    pub probe_env: String,
}

/// How log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable on a terminal, JSON otherwise
    #[default]
    Auto,
    Pretty,
    Json,
}

// Default value functions
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_stop_timeout() -> u32 {
    10
}

fn default_kill_signal() -> String {
    "SIGKILL".to_string()
}

fn default_probe_env() -> String {
    "WEAVE_CIDR=none".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            docker_host: None,
            stop_timeout_secs: default_stop_timeout(),
            kill_signal: default_kill_signal(),
            probe_env: default_probe_env(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if present
        let _ = dotenvy::dotenv();

        Self::build(&["config/weaveutil", "/etc/weaveutil/config"])
    }

    /// Load configuration from one optional file plus the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let path = path.to_string_lossy();
        Self::build(&[path.as_ref()])
    }

    fn build(files: &[&str]) -> Result<Self> {
        let mut builder = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?);

        for file in files {
            builder = builder.add_source(config::File::with_name(file).required(false));
        }

        let config = builder
            // Override with environment variables (WEAVEUTIL__ prefix)
            .add_source(
                config::Environment::with_prefix("WEAVEUTIL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.kill_signal.trim().is_empty() {
            anyhow::bail!("Kill signal cannot be empty");
        }

        match self.probe_env.split_once('=') {
            Some((key, _)) if !key.is_empty() => {}
            _ => anyhow::bail!("Probe marker must have the form KEY=VALUE"),
        }

        if let Some(host) = &self.docker_host {
            let supported = ["unix://", "tcp://", "http://"];
            if !supported.iter().any(|scheme| host.starts_with(scheme)) {
                anyhow::bail!("Unsupported docker host: {}", host);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.stop_timeout_secs, 10);
        assert_eq!(config.kill_signal, "SIGKILL");
        assert_eq!(config.probe_env, "WEAVE_CIDR=none");
        assert_eq!(config.log_format, LogFormat::Auto);
        assert!(config.docker_host.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = AppConfig {
            kill_signal: " ".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            probe_env: "WEAVE_CIDR".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            docker_host: Some("ssh://core@node1".to_string()),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "stop_timeout_secs = 30\nkill_signal = \"SIGTERM\"\nlog_format = \"json\""
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.stop_timeout_secs, 30);
        assert_eq!(config.kill_signal, "SIGTERM");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.probe_env, "WEAVE_CIDR=none");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.stop_timeout_secs, 10);
    }
}
