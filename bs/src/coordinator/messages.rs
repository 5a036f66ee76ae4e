//! Message types for the Coordinator

use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::aggregate::Badge;
use crate::protocol::{Envelope, MessageId, RunStateView, Sender};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("Coordinator channel closed")]
    ChannelClosed,
}

/// Internal requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// An inbound payload; dropping `reply` means the payload was ignored
    Deliver {
        sender: Sender,
        payload: Value,
        reply: oneshot::Sender<Value>,
    },

    /// Shutdown the coordinator
    Shutdown,
}

/// Updates pushed to control surfaces
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    RunState(RunStateView),
    Badge(Badge),
}

impl Push {
    pub fn to_envelope(&self) -> Envelope {
        match self {
            Self::RunState(view) => Envelope::with_data(MessageId::BotRunState, json!(view)),
            Self::Badge(badge) => Envelope::with_data(MessageId::BotBadge, json!(badge)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::BadgeColor;

    #[test]
    fn test_push_envelopes() {
        let badge = Push::Badge(Badge {
            text: "3".to_string(),
            count: 3,
            color: BadgeColor::Warn,
        });
        assert_eq!(
            badge.to_envelope().to_value(),
            json!({"id": "bot.badge", "data": {"text": "3", "count": 3, "color": "warn"}})
        );
    }
}
