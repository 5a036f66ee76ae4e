//! Aggregation engine
//!
//! Logs, cumulative stats and unseen counters live in the session store and
//! are written only by the [`AggregateEngine`] actor. Each write runs
//! load -> transform -> persist inside the actor, so concurrent writers can
//! never interleave and lose an increment.

mod badge;
mod config;
mod engine;
mod messages;
mod transform;

pub use badge::{Badge, BadgeColor};
pub use config::RetentionConfig;
pub use engine::AggregateEngine;
pub use messages::{AggregateCommand, AggregateError, AggregateResponse, WriteOutcome};
pub use transform::{LOGS_KEY, STATS_KEY, Snapshot, UNSEEN_KEY};
