//! weaveutil - container operations on behalf of an orchestration controller
//!
//! Each invocation runs one subcommand against the Docker daemon and exits.
//! Results go to stdout, diagnostics to stderr.

use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use weaveutil::args::{self, usage_for};
use weaveutil::config::AppConfig;
use weaveutil::container::{ContainerManager, ExactMatcher, ImageMatcher, RegexMatcher};
use weaveutil::logging::init_logging;
use weaveutil::{DockerClient, ImageReference};

/// weaveutil - inspect, create and reclaim containers
#[derive(Parser)]
#[command(name = "weaveutil")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Container operations for an orchestration controller", long_about = None)]
struct Cli {
    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full id of a container
    ContainerId {
        /// Container name or short id
        container: String,
    },

    /// Print a container's state, optionally checked against an expected image
    ContainerState {
        /// Compare the image literally instead of as a regular expression
        #[arg(long)]
        exact: bool,

        /// Container id
        container: String,

        /// Expected image name or id
        image: Option<String>,
    },

    /// Print <hostname>.<domainname> of a container
    ContainerFqdn {
        /// Container id
        container: String,
    },

    /// Print the id of every container carrying a label, one per line
    ListContainers {
        /// Label filter (key or key=value)
        label: String,
    },

    /// Create and start a container, printing its id
    #[command(disable_help_flag = true)]
    RunContainer {
        /// Flags, image and command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
        args: Vec<String>,
    },

    /// Stop containers with a grace period
    StopContainer {
        /// Container ids
        #[arg(required = true)]
        containers: Vec<String>,
    },

    /// Kill containers
    KillContainer {
        /// Container ids
        #[arg(required = true)]
        containers: Vec<String>,
    },

    /// Remove containers
    #[command(disable_help_flag = true)]
    RemoveContainer {
        /// [-f|--force] [-v|--volumes] and container ids
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
        args: Vec<String>,
    },

    /// Pull an image, defaulting the tag to latest
    PullImage {
        /// Image name with optional tag
        image: String,
    },

    /// Print the output of `<image> --version` run in a throwaway container
    AskVersion {
        /// Container or image the probe image is taken from
        reference: String,
    },
}

/// Subcommands whose arguments go to [`args`] exactly as given
const RAW_TAIL_COMMANDS: [&str; 2] = ["run-container", "remove-container"];

impl Cli {
    /// Parse argv with clap, except that everything after `run-container` or
    /// `remove-container` is handed to the flag parser untouched, `--`
    /// included.
    fn parse_raw<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let (head, tail) = argv.split_at(raw_tail_start(&argv));

        let mut cli = Cli::try_parse_from(head)?;
        if let Commands::RunContainer { args } | Commands::RemoveContainer { args } =
            &mut cli.command
        {
            *args = tail.to_vec();
        }
        Ok(cli)
    }
}

/// Index just past a raw-tail subcommand, or `argv.len()` when the
/// subcommand is some other one.
fn raw_tail_start(argv: &[String]) -> usize {
    let mut i = 1;
    while let Some(token) = argv.get(i) {
        match token.as_str() {
            "--log-level" => i += 2,
            t if RAW_TAIL_COMMANDS.contains(&t) => return i + 1,
            t if t.starts_with('-') => i += 1,
            _ => break,
        }
    }
    argv.len()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse_raw(std::env::args()).unwrap_or_else(|e| e.exit());

    let config = match bootstrap(cli.log_level.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, &config).await {
        process::exit(report(&e));
    }
}

/// Load configuration and install logging
fn bootstrap(log_level: Option<&str>) -> Result<AppConfig> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(level) = log_level {
        config.log_level = level.to_string();
    }

    init_logging(&config.log_level, config.log_format)?;
    debug!(version = env!("CARGO_PKG_VERSION"), "weaveutil starting");
    Ok(config)
}

/// Print an error and return the exit code for it
fn report(err: &anyhow::Error) -> i32 {
    eprintln!("{} {:#}", "error:".red().bold(), err);

    match err.downcast_ref::<weaveutil::Error>() {
        Some(e @ weaveutil::Error::Usage { command, .. }) => {
            if let Some(usage) = usage_for(command) {
                eprintln!("{} weaveutil {}", "usage:".bright_cyan(), usage);
            }
            e.exit_code()
        }
        Some(e) => e.exit_code(),
        None => 1,
    }
}

fn connect(config: &AppConfig) -> Result<ContainerManager<DockerClient>> {
    let client = DockerClient::connect(config.docker_host.as_deref())?;
    Ok(ContainerManager::new(client, config))
}

async fn run(command: Commands, config: &AppConfig) -> Result<()> {
    let mut stdout = io::stdout();

    match command {
        Commands::ContainerId { container } => {
            let id = connect(config)?.container_id(&container).await?;
            write!(stdout, "{}", id)?;
        }

        Commands::ContainerState {
            exact,
            container,
            image,
        } => {
            let matcher: Option<Box<dyn ImageMatcher>> = match image {
                Some(image) if exact => Some(Box::new(ExactMatcher::new(image))),
                Some(image) => Some(Box::new(RegexMatcher::new(&image)?)),
                None => None,
            };
            let state = connect(config)?
                .container_state(&container, matcher.as_deref())
                .await?;
            write!(stdout, "{}", state)?;
        }

        Commands::ContainerFqdn { container } => {
            let fqdn = connect(config)?.container_fqdn(&container).await?;
            write!(stdout, "{}", fqdn)?;
        }

        Commands::ListContainers { label } => {
            for id in connect(config)?.list_containers(&label).await? {
                writeln!(stdout, "{}", id)?;
            }
        }

        Commands::RunContainer { args } => {
            let spec = args::parse_run(&args)?;
            let id = connect(config)?.run(&spec).await?;
            writeln!(stdout, "{}", id)?;
        }

        Commands::StopContainer { containers } => {
            connect(config)?.stop_containers(&containers).await?;
        }

        Commands::KillContainer { containers } => {
            connect(config)?.kill_containers(&containers).await?;
        }

        Commands::RemoveContainer { args } => {
            let (options, containers) = args::parse_remove(&args)?;
            connect(config)?
                .remove_containers(&containers, options)
                .await?;
        }

        Commands::PullImage { image } => {
            let reference = ImageReference::parse(&image)?;
            for line in reference.pull_banner() {
                writeln!(stdout, "{}", line)?;
            }
            stdout.flush()?;
            connect(config)?.pull_image(&reference).await?;
        }

        Commands::AskVersion { reference } => {
            let output = connect(config)?.ask_version(&reference).await?;
            stdout.write_all(&output)?;
        }
    }

    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    fn raw(argv: &[&str]) -> Vec<String> {
        match Cli::parse_raw(argv.iter().copied()).unwrap().command {
            Commands::RunContainer { args } | Commands::RemoveContainer { args } => args,
            _ => panic!("expected a pass-through subcommand"),
        }
    }

    #[test]
    fn test_run_container_passes_flags_through() {
        let args = raw(&[
            "weaveutil",
            "run-container",
            "-v",
            "/a:/a",
            "--privileged",
            "img",
            "--port",
            "1",
        ]);
        assert_eq!(args, ["-v", "/a:/a", "--privileged", "img", "--port", "1"]);
    }

    #[test]
    fn test_run_container_double_dash_reaches_flag_parser() {
        let args = raw(&["weaveutil", "run-container", "--", "-v", "/a:/a", "img", "cmd"]);
        assert_eq!(args, ["--", "-v", "/a:/a", "img", "cmd"]);

        let spec = args::parse_run(&args).unwrap();
        assert_eq!(spec.image(), "-v");
        assert_eq!(spec.cmd(), ["/a:/a", "img", "cmd"]);
        assert!(spec.binds().is_empty());
    }

    #[test]
    fn test_remove_container_passes_flags_through() {
        assert_eq!(raw(&["weaveutil", "remove-container", "-f", "c1"]), ["-f", "c1"]);
    }

    #[test]
    fn test_remove_container_double_dash_reaches_flag_parser() {
        let args = raw(&["weaveutil", "remove-container", "--", "-f", "c1"]);
        let (options, ids) = args::parse_remove(&args).unwrap();
        assert!(!options.force);
        assert_eq!(ids, ["-f", "c1"]);
    }

    #[test]
    fn test_log_level_before_pass_through_subcommand() {
        let cli = Cli::parse_raw([
            "weaveutil",
            "--log-level",
            "debug",
            "run-container",
            "img",
            "cmd",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::RunContainer { args } => assert_eq!(args, ["img", "cmd"]),
            _ => panic!("expected run-container"),
        }
    }

    #[test]
    fn test_log_level_after_subcommand() {
        let cli = Cli::parse_raw(["weaveutil", "container-id", "--log-level", "debug", "weave"])
            .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::ContainerId { container } => assert_eq!(container, "weave"),
            _ => panic!("expected container-id"),
        }
    }

    #[test]
    fn test_stop_requires_an_id() {
        assert!(Cli::parse_raw(["weaveutil", "stop-container"]).is_err());
    }

    #[test]
    fn test_container_state_pattern_is_optional() {
        let cli = Cli::parse_raw(["weaveutil", "container-state", "--exact", "c1", "img"])
            .unwrap();
        match cli.command {
            Commands::ContainerState {
                exact,
                container,
                image,
            } => {
                assert!(exact);
                assert_eq!(container, "c1");
                assert_eq!(image.as_deref(), Some("img"));
            }
            _ => panic!("expected container-state"),
        }
    }

    #[test]
    fn test_usage_error_exit_code() {
        let err = anyhow::Error::from(weaveutil::Error::usage("run-container", "missing image"));
        assert_eq!(report(&err), 2);
    }
}
