//! Coordinator-to-page transport
//!
//! The coordinator reaches page contexts only through [`PageTransport`].
//! [`ChannelPages`] connects pages living in the same process;
//! [`crate::ipc::SocketPages`] connects pages over the Unix socket.

mod channel;
mod relay;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{Envelope, PageId};

pub use channel::{ChannelPages, PageInbox, PageRequest};
pub use relay::broadcast;

/// Errors reaching a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("page {0} is not connected")]
    NotConnected(PageId),

    #[error("page {0} closed without answering")]
    Closed(PageId),

    #[error("I/O error talking to page {page}: {reason}")]
    Io { page: PageId, reason: String },
}

#[async_trait]
pub trait PageTransport: Send + Sync {
    /// Connected pages, oldest connection first
    async fn pages(&self) -> Vec<PageId>;

    /// Send one envelope to one page and wait for its answer
    async fn request(&self, page: &PageId, envelope: Envelope) -> Result<Value, TransportError>;
}
