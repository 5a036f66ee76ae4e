//! CoordinatorHandle - client interface for surfaces and pages

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use super::messages::{CoordRequest, CoordinatorError, Push};
use crate::protocol::{Envelope, Sender};

/// Cloneable handle to a running Coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
    push_tx: broadcast::Sender<Push>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>, push_tx: broadcast::Sender<Push>) -> Self {
        Self { tx, push_tx }
    }

    /// Deliver a raw payload and wait for the reply
    ///
    /// `Ok(None)` means the coordinator ignored the payload.
    pub async fn deliver(&self, sender: Sender, payload: Value) -> Result<Option<Value>, CoordinatorError> {
        debug!(%sender, "CoordinatorHandle::deliver: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordRequest::Deliver {
                sender,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        Ok(reply_rx.await.ok())
    }

    pub async fn request(&self, sender: Sender, envelope: Envelope) -> Result<Option<Value>, CoordinatorError> {
        self.deliver(sender, envelope.to_value()).await
    }

    /// Receive every push sent after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Push> {
        debug!("CoordinatorHandle::subscribe: called");
        self.push_tx.subscribe()
    }

    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }
}
