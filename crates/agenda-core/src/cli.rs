use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "agenda",
    version,
    about = "Agenda: month calendar and space availability for event requests",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override one agendarc setting, e.g. `--rc color=off`.
    #[arg(
        long = "rc",
        value_name = "KEY=VALUE",
        value_parser = parse_setting,
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<(String, String)>,

    #[arg(long = "agendarc", global = true)]
    pub agendarc: Option<PathBuf>,

    #[arg(long = "items", global = true)]
    pub items: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Month grid with the events of each day.
    Month {
        /// `2025-05`, `may`, `next`, `+2m`; defaults to the current month.
        #[arg(long = "month")]
        month: Option<String>,

        /// Only show events held in this space.
        #[arg(long = "space")]
        space: Option<String>,

        /// Day to highlight.
        #[arg(long = "select")]
        select: Option<String>,

        /// Colour days by the availability of `--space`.
        #[arg(long = "availability", requires = "space")]
        availability: bool,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filter: Vec<String>,
    },
    /// Seven days of one space's availability, starting at DATE.
    Week {
        #[arg(default_value = "today")]
        date: String,

        #[arg(long = "space")]
        space: String,
    },
    /// Events of one day, with the free slots of a space.
    Day {
        #[arg(default_value = "today")]
        date: String,

        #[arg(long = "space")]
        space: Option<String>,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filter: Vec<String>,
    },
    /// Configured spaces and their booking policies.
    Spaces,
}

impl Default for Command {
    fn default() -> Self {
        Command::Month {
            month: None,
            space: None,
            select: None,
            availability: false,
            filter: vec![],
        }
    }
}

fn parse_setting(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got: {raw}")),
    }
}

/// `-q` wins over `-v`; each `-v` opens one more level.
fn default_log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    }
}

/// Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
/// beats the `-v`/`-q` level.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let level = default_log_level(verbose, quiet);
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| anyhow!("invalid log level {level}: {e}"))?,
    };

    let stderr_is_tty = std::io::stderr().is_terminal();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(stderr_is_tty)
        .with_target(true)
        .try_init()
    {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
