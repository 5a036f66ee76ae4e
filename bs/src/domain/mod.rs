//! Domain types for botsync
//!
//! Value types that cross the context boundary: the run state, log entries
//! and domain events, cumulative statistics, and user preferences.

mod log;
mod preferences;
mod run_state;
mod stats;

pub use log::{DomainEvent, EventKind, LogEntry, LogType, Logs, TIME_FORMAT, Unseen, timestamp_now};
pub use preferences::{Preferences, PreferencesError, UserSource};
pub use run_state::{RunState, UnknownRunState};
pub use stats::{KakeraStats, Stats, StatsOutcome, Steal};
