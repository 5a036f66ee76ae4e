//! Aggregation engine messages
//!
//! Commands and responses for the actor pattern.

use sessionstore::StoreError;
use thiserror::Error;
use tokio::sync::oneshot;

use super::badge::Badge;
use super::transform::Snapshot;
use crate::domain::{DomainEvent, LogType, Unseen};

/// Errors from aggregation operations
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Stored {key} is corrupt: {reason}")]
    Corrupt { key: &'static str, reason: String },

    #[error("Channel error")]
    ChannelError,
}

pub type AggregateResponse<T> = Result<T, AggregateError>;

/// Result of one write, used to refresh the badge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub unseen: Unseen,
    pub badge: Badge,
}

/// Commands sent to the AggregateEngine actor
#[derive(Debug)]
pub enum AggregateCommand {
    RecordEvent {
        event: DomainEvent,
        reply: oneshot::Sender<AggregateResponse<WriteOutcome>>,
    },
    RecordWarn {
        message: String,
        reply: oneshot::Sender<AggregateResponse<WriteOutcome>>,
    },
    RecordError {
        message: String,
        is_critical: bool,
        reply: oneshot::Sender<AggregateResponse<WriteOutcome>>,
    },
    ClearUnseen {
        log_type: LogType,
        reply: oneshot::Sender<AggregateResponse<WriteOutcome>>,
    },
    GetEverything {
        reply: oneshot::Sender<AggregateResponse<Snapshot>>,
    },
    /// Drop logs, stats and unseen counters
    Reset {
        reply: oneshot::Sender<AggregateResponse<Snapshot>>,
    },
    Shutdown,
}
