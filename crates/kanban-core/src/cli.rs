use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "kanban",
    version,
    about = "Kanban boards for your projects, from the terminal",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "kanbanrc")]
    pub kanbanrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// Command line after global flags: optional filter terms, then a command
/// and its arguments. `kanban +bug pri:high list` filters the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub filter_terms: Vec<String>,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();
        let default_command = cfg
            .get("default.command")
            .unwrap_or_else(|| DEFAULT_COMMAND.to_string());

        if tokens.is_empty() {
            debug!(command = %default_command, "no explicit command, using default");
            return Ok(Self {
                filter_terms: vec![],
                command: default_command,
                command_args: vec![],
            });
        }

        match split_filter_command(&tokens) {
            Some(invocation) => Ok(invocation),
            None => {
                warn!(
                    command = %default_command,
                    "no command detected, treating all terms as filter"
                );
                Ok(Self {
                    filter_terms: tokens,
                    command: default_command,
                    command_args: vec![],
                })
            }
        }
    }
}

const DEFAULT_COMMAND: &str = "board";

fn split_filter_command(tokens: &[String]) -> Option<Invocation> {
    let known = crate::commands::known_command_names();

    for (i, token) in tokens.iter().enumerate() {
        if let Some(full) = crate::commands::expand_command_abbrev(token, &known) {
            debug!(
                token = %token,
                expanded = %full,
                split_index = i,
                "resolved command token"
            );
            return Some(Invocation {
                filter_terms: tokens[..i].to_vec(),
                command: full.to_string(),
                command_args: tokens[i + 1..].to_vec(),
            });
        }
        // Only filter terms may precede the command.
        if !looks_like_filter(token) {
            return None;
        }
    }

    None
}

fn looks_like_filter(token: &str) -> bool {
    token.starts_with('+') || token.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn preprocess_extracts_positional_overrides() {
        let out = preprocess_args(&args(&["kanban", "rc.color=off", "list"]))
            .expect("preprocess");
        assert_eq!(out.cleaned_args, args(&["kanban", "list"]));
        assert_eq!(
            out.rc_overrides,
            vec![("rc.color".to_string(), "off".to_string())]
        );
    }

    #[test]
    fn empty_invocation_uses_default_command() {
        let cfg = Config::defaults();
        let inv = Invocation::parse(&cfg, vec![]).expect("parse");
        assert_eq!(inv.command, "board");
        assert!(inv.filter_terms.is_empty());
    }

    #[test]
    fn filter_terms_precede_the_command() {
        let cfg = Config::defaults();
        let inv = Invocation::parse(&cfg, args(&["+bug", "pri:high", "list"])).expect("parse");
        assert_eq!(inv.filter_terms, vec!["+bug", "pri:high"]);
        assert_eq!(inv.command, "list");
    }

    #[test]
    fn command_arguments_are_not_reinterpreted() {
        let cfg = Config::defaults();
        let inv = Invocation::parse(&cfg, args(&["mov", "abcd", "right"])).expect("parse");
        assert_eq!(inv.command, "move");
        assert_eq!(inv.command_args, vec!["abcd", "right"]);
    }

    #[test]
    fn key_val_requires_equals() {
        assert!("color".parse::<KeyVal>().is_err());
        let kv = "color = off".parse::<KeyVal>().expect("keyval");
        assert_eq!((kv.key.as_str(), kv.value.as_str()), ("color", "off"));
    }
}
