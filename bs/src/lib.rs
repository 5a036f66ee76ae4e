//! botsync - run-state and event synchronization for a page automation bot
//!
//! A bot runs inside one or more pages. A control surface shows its state
//! and lets the user start, pause and configure it. Between them sits a
//! single coordinator that owns the authoritative run state, folds page
//! events into session logs and statistics, and relays preferences.
//!
//! # Core Concepts
//!
//! - **One owner**: the [`coordinator`] handles messages one at a time, so
//!   run-state transitions never interleave
//! - **Serialized writes**: session logs and stats live behind the
//!   [`aggregate`] engine; concurrent reports never lose updates
//! - **Tagged wire form**: sets and maps cross the transport through [`codec`]
//!
//! # Modules
//!
//! - [`protocol`] - message ids, envelopes and reply payloads
//! - [`domain`] - run state, logs, stats and preferences
//! - [`state`] - run-state machine and the run guard
//! - [`aggregate`] - session log and stats engine
//! - [`transport`] - page transport trait, in-process pages and relay
//! - [`ipc`] - Unix socket transport for surfaces and pages
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod aggregate;
pub mod cli;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod ipc;
pub mod protocol;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use aggregate::{AggregateEngine, Badge, BadgeColor, RetentionConfig, Snapshot};
pub use codec::{CodecError, Structured};
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle, Push};
pub use domain::{DomainEvent, EventKind, LogEntry, LogType, Preferences, RunState, Stats, Unseen, UserSource};
pub use protocol::{Envelope, MessageId, PageId, ProtocolError, RunStateView, Sender};
pub use transport::{ChannelPages, PageTransport};
