//! Flag-table argument parsing for subcommands that take docker-style flags
//!
//! Parsing walks an immutable slice with a cursor. The first token that is not
//! a recognized flag ends flag parsing; it and everything after it are kept as
//! positionals in their original order.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{ContainerSpec, RemoveOptions, RestartPolicy};

/// How repeated occurrences of a flag combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulate {
    /// Keep every value, skipping exact duplicates
    Dedup,
    /// Keep every value in order
    Append,
    /// Last value wins
    Overwrite,
}

/// One recognized flag
#[derive(Debug, Clone, Copy)]
pub struct FlagDef {
    /// Canonical key, also the long form without dashes
    pub long: &'static str,
    pub short: Option<char>,
    /// Whether the flag consumes a value
    pub takes_value: bool,
    pub accumulate: Accumulate,
}

impl FlagDef {
    pub const fn value(long: &'static str, short: Option<char>, accumulate: Accumulate) -> Self {
        Self {
            long,
            short,
            takes_value: true,
            accumulate,
        }
    }

    pub const fn switch(long: &'static str, short: Option<char>) -> Self {
        Self {
            long,
            short,
            takes_value: false,
            accumulate: Accumulate::Overwrite,
        }
    }
}

/// Flags accepted by `run-container`
pub const RUN_FLAGS: &[FlagDef] = &[
    FlagDef::value("env", Some('e'), Accumulate::Append),
    FlagDef::value("name", None, Accumulate::Overwrite),
    FlagDef::value("net", None, Accumulate::Overwrite),
    FlagDef::value("pid", None, Accumulate::Overwrite),
    FlagDef::switch("privileged", None),
    FlagDef::value("restart", None, Accumulate::Overwrite),
    FlagDef::value("volume", Some('v'), Accumulate::Dedup),
    FlagDef::value("volumes-from", None, Accumulate::Append),
];

/// Flags accepted by `remove-container`
pub const REMOVE_FLAGS: &[FlagDef] = &[
    FlagDef::switch("force", Some('f')),
    FlagDef::switch("volumes", Some('v')),
];

pub const RUN_USAGE: &str = "run-container [-e|--env KEY=VAL]... [--name NAME] [--net MODE] \
[--pid MODE] [--privileged] [--restart POLICY] [-v|--volume BIND]... [--volumes-from ID]... \
<image> <cmd> [<args>...]";

pub const REMOVE_USAGE: &str =
    "remove-container [-f | --force] [-v | --volumes] <container-id> [<container-id2> ...]";

/// Result of a flag-table parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    values: HashMap<&'static str, Vec<String>>,
    switches: Vec<&'static str>,
    positionals: Vec<String>,
}

impl ParsedArgs {
    /// All values of a repeatable flag
    pub fn values(&self, long: &str) -> &[String] {
        self.values.get(long).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The single value of an overwrite flag
    pub fn value(&self, long: &str) -> Option<&str> {
        self.values(long).last().map(String::as_str)
    }

    pub fn switch(&self, long: &str) -> bool {
        self.switches.contains(&long)
    }

    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    fn record(&mut self, def: &FlagDef, value: Option<String>) {
        let Some(value) = value else {
            if !self.switches.contains(&def.long) {
                self.switches.push(def.long);
            }
            return;
        };

        let slot = self.values.entry(def.long).or_default();
        match def.accumulate {
            Accumulate::Dedup => {
                if !slot.contains(&value) {
                    slot.push(value);
                }
            }
            Accumulate::Append => slot.push(value),
            Accumulate::Overwrite => {
                slot.clear();
                slot.push(value);
            }
        }
    }
}

/// Parse `args` against `table` for `command`
pub fn parse(command: &'static str, table: &[FlagDef], args: &[String]) -> Result<ParsedArgs> {
    let mut parsed = ParsedArgs::default();
    let mut cursor = 0;

    while cursor < args.len() {
        let token = args[cursor].as_str();

        if token == "--" {
            cursor += 1;
            break;
        }

        let (def, inline) = match lookup(table, token) {
            Some(found) => found,
            None => break,
        };
        cursor += 1;

        if !def.takes_value {
            if inline.is_some() {
                return Err(Error::usage(
                    command,
                    format!("flag --{} does not take a value", def.long),
                ));
            }
            parsed.record(def, None);
            continue;
        }

        let value = match inline {
            Some(value) => value.to_string(),
            None => {
                let value = args.get(cursor).ok_or_else(|| {
                    Error::usage(command, format!("flag {} requires a value", token))
                })?;
                cursor += 1;
                value.clone()
            }
        };
        parsed.record(def, Some(value));
    }

    parsed.positionals = args[cursor..].to_vec();
    Ok(parsed)
}

/// Match a token against the table, splitting `--long=value`
fn lookup<'t, 'a>(table: &'t [FlagDef], token: &'a str) -> Option<(&'t FlagDef, Option<&'a str>)> {
    if let Some(long) = token.strip_prefix("--") {
        let (name, inline) = match long.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (long, None),
        };
        return table.iter().find(|d| d.long == name).map(|d| (d, inline));
    }

    let mut chars = token.strip_prefix('-')?.chars();
    let short = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    table.iter().find(|d| d.short == Some(short)).map(|d| (d, None))
}

/// Parse `run-container` arguments into a spec
pub fn parse_run(args: &[String]) -> Result<ContainerSpec> {
    const COMMAND: &str = "run-container";

    let parsed = parse(COMMAND, RUN_FLAGS, args)?;
    let (image, cmd) = match parsed.positionals() {
        [image, cmd @ ..] if !cmd.is_empty() => (image, cmd),
        _ => {
            return Err(Error::usage(
                COMMAND,
                "an image and at least one command argument are required",
            ))
        }
    };

    let mut builder = ContainerSpec::builder(image.as_str()).cmd(cmd.iter().cloned());
    for var in parsed.values("env") {
        builder = builder.env(var.as_str());
    }
    if let Some(name) = parsed.value("name") {
        builder = builder.name(name);
    }
    if let Some(net) = parsed.value("net") {
        builder = builder.network_mode(net);
    }
    if let Some(pid) = parsed.value("pid") {
        builder = builder.pid_mode(pid);
    }
    if let Some(restart) = parsed.value("restart") {
        builder = builder.restart_policy(restart.parse::<RestartPolicy>()?);
    }
    for bind in parsed.values("volume") {
        builder = builder.bind(bind.as_str());
    }
    for source in parsed.values("volumes-from") {
        builder = builder.volumes_from(source.as_str());
    }

    Ok(builder.privileged(parsed.switch("privileged")).build())
}

/// Parse `remove-container` arguments into options plus target ids
pub fn parse_remove(args: &[String]) -> Result<(RemoveOptions, Vec<String>)> {
    const COMMAND: &str = "remove-container";

    let parsed = parse(COMMAND, REMOVE_FLAGS, args)?;
    if parsed.positionals().is_empty() {
        return Err(Error::usage(COMMAND, "at least one container id is required"));
    }

    let options = RemoveOptions {
        force: parsed.switch("force"),
        remove_volumes: parsed.switch("volumes"),
    };
    Ok((options, parsed.positionals().to_vec()))
}

/// Usage line for a subcommand
pub fn usage_for(command: &str) -> Option<&'static str> {
    let usage = match command {
        "container-id" => "container-id <container-name-or-short-id>",
        "container-state" => "container-state [--exact] <container-id> [<image-name-or-id>]",
        "container-fqdn" => "container-fqdn <container-id>",
        "list-containers" => "list-containers <label>",
        "run-container" => RUN_USAGE,
        "stop-container" => "stop-container <container-id> [<container-id2> ...]",
        "kill-container" => "kill-container <container-id> [<container-id2> ...]",
        "remove-container" => REMOVE_USAGE,
        "pull-image" => "pull-image <image-name>[:<tag>]",
        "ask-version" => "ask-version <container-or-image-ref>",
        _ => return None,
    };
    Some(usage)
}
