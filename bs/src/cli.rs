//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::domain::{EventKind, LogType};

/// botsync - keeps a page bot, its coordinator and its control surface in sync
#[derive(Parser)]
#[command(
    name = "bs",
    about = "Coordinator and control surface for the page bot sync protocol",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Coordinator socket (overrides config)
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the coordinator in the foreground
    Serve,

    /// Show the current run state
    Status {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Forget the run state and ask the page again
    Refresh,

    /// Inject the bot with the given preferences
    Run {
        /// YAML preferences file
        #[arg(short, long)]
        prefs: Option<PathBuf>,
    },

    /// Pause or resume the bot
    Toggle {
        /// YAML preferences file
        #[arg(short, long)]
        prefs: Option<PathBuf>,
    },

    /// Show logs, stats and unseen counters
    Everything {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Mark one log collection as seen
    Clear {
        #[arg(value_enum)]
        log_type: LogTypeArg,
    },

    /// Drop all session logs and stats
    Reset,

    /// Send preferences to every connected page
    Sync {
        /// YAML preferences file
        #[arg(short, long)]
        prefs: PathBuf,
    },

    /// Report to the coordinator as a page (manual testing)
    Emit {
        /// Page id to report as
        #[arg(long, default_value = "cli")]
        page: String,

        #[command(subcommand)]
        report: EmitCommand,
    },

    /// Stream run-state and badge updates
    Watch,
}

#[derive(Debug, Subcommand)]
pub enum EmitCommand {
    /// A domain event
    Event {
        #[arg(value_enum)]
        kind: EventKindArg,

        /// Event data as JSON
        #[arg(default_value = "{}")]
        data: String,
    },

    Warn {
        message: String,
    },

    Error {
        message: String,

        #[arg(long)]
        critical: bool,
    },
}

/// Output format for status commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogTypeArg {
    Event,
    Warn,
    Error,
}

impl From<LogTypeArg> for LogType {
    fn from(arg: LogTypeArg) -> Self {
        match arg {
            LogTypeArg::Event => LogType::Event,
            LogTypeArg::Warn => LogType::Warn,
            LogTypeArg::Error => LogType::Error,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EventKindArg {
    Claim,
    Steal,
    Kakera,
    Soulmate,
    CharacterFound,
    Bonus,
}

impl From<EventKindArg> for EventKind {
    fn from(arg: EventKindArg) -> Self {
        match arg {
            EventKindArg::Claim => EventKind::Claim,
            EventKindArg::Steal => EventKind::Steal,
            EventKindArg::Kakera => EventKind::Kakera,
            EventKindArg::Soulmate => EventKind::Soulmate,
            EventKindArg::CharacterFound => EventKind::CharacterFound,
            EventKindArg::Bonus => EventKind::Bonus,
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("botsync")
        .join("logs")
        .join("botsync.log")
}
