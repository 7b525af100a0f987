use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
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
    name = "studyplan",
    version,
    about = "Track a study schedule: daily, weekly and monthly views with progress metrics"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    /// Config file (TOML); defaults to $STUDYPLAN_CONFIG or the platform config dir
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding schedules.json
    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Evaluate as if today were this ISO date
    #[arg(long = "today", global = true)]
    pub today: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List saved schedules
    List,

    /// Show a daily, weekly or monthly view of a schedule
    Show {
        id: String,

        /// daily | weekly | monthly (defaults to view.default)
        #[arg(long)]
        view: Option<String>,

        /// Reference date: ISO date, today, tomorrow, +3d, -1w, +2m
        #[arg(long)]
        date: Option<String>,

        /// Navigate this many steps from the reference date (negative goes back)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        step: i32,

        /// Monthly list of days with tasks instead of the grid
        #[arg(long)]
        agenda: bool,
    },

    /// Progress, streak and achievement summary
    Report {
        id: String,

        /// Pick a different encouragement message
        #[arg(long, default_value_t = 0)]
        message: usize,
    },

    /// Mark a task as completed
    Complete {
        id: String,
        /// Date of the task (ISO date or relative expression)
        date: String,
        /// Subject, or #N for the N-th task of that day
        task: String,
    },

    /// Mark a task as not completed
    Reopen {
        id: String,
        date: String,
        task: String,
    },

    /// Rename a schedule
    Rename { id: String, name: String },

    /// Delete a schedule
    Remove { id: String },

    /// Import schedules from a JSON file (stdin when omitted)
    Import { path: Option<PathBuf> },

    /// Print a schedule in its persisted JSON form
    Export { id: String },
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
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` tokens out of argv.
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

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn extracts_positional_rc_overrides() {
        let pre = preprocess_args(&args(&["studyplan", "rc.color=off", "list", "rc.view.default:weekly"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["studyplan", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.view.default".to_string(), "weekly".to_string()),
            ]
        );
    }

    #[test]
    fn parses_show_with_negative_step() {
        let cli = GlobalCli::try_parse_from(args(&[
            "studyplan", "show", "abc", "--view", "weekly", "--step", "-2", "--today", "2026-10-16",
        ]))
        .expect("parse");

        assert_eq!(cli.today.as_deref(), Some("2026-10-16"));
        match cli.command {
            Some(Command::Show { id, view, step, agenda, .. }) => {
                assert_eq!(id, "abc");
                assert_eq!(view.as_deref(), Some("weekly"));
                assert_eq!(step, -2);
                assert!(!agenda);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn key_val_requires_equals() {
        assert!("color".parse::<KeyVal>().is_err());
        let kv = "color = off".parse::<KeyVal>().expect("parse");
        assert_eq!(kv.key, "color");
        assert_eq!(kv.value, "off");
    }
}
