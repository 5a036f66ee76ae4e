//! In-process page connections over tokio channels

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info};

use super::{PageTransport, TransportError};
use crate::protocol::{Envelope, PageId};

const PAGE_BUFFER: usize = 16;

/// A request delivered to a page, with the slot for its answer
#[derive(Debug)]
pub struct PageRequest {
    pub envelope: Envelope,
    pub reply: oneshot::Sender<Value>,
}

/// Pages connected through channels
#[derive(Clone, Default)]
pub struct ChannelPages {
    pages: Arc<Mutex<Vec<(PageId, mpsc::Sender<PageRequest>)>>>,
}

impl ChannelPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page; a page id that is already connected is replaced
    pub async fn connect(&self, page_id: PageId) -> PageInbox {
        debug!(%page_id, "connect: called");
        let (tx, rx) = mpsc::channel(PAGE_BUFFER);
        let mut pages = self.pages.lock().await;
        pages.retain(|(id, _)| *id != page_id);
        pages.push((page_id.clone(), tx));
        info!(%page_id, "Page connected");
        PageInbox { page_id, rx }
    }

    pub async fn disconnect(&self, page_id: &PageId) {
        debug!(%page_id, "disconnect: called");
        self.pages.lock().await.retain(|(id, _)| id != page_id);
    }
}

#[async_trait]
impl PageTransport for ChannelPages {
    async fn pages(&self) -> Vec<PageId> {
        self.pages.lock().await.iter().map(|(id, _)| id.clone()).collect()
    }

    async fn request(&self, page: &PageId, envelope: Envelope) -> Result<Value, TransportError> {
        debug!(%page, id = %envelope.id, "ChannelPages::request: called");
        let tx = self
            .pages
            .lock()
            .await
            .iter()
            .find(|(id, _)| id == page)
            .map(|(_, tx)| tx.clone())
            .ok_or_else(|| TransportError::NotConnected(page.clone()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(PageRequest {
            envelope,
            reply: reply_tx,
        })
        .await
        .map_err(|_| TransportError::Closed(page.clone()))?;
        reply_rx.await.map_err(|_| TransportError::Closed(page.clone()))
    }
}

/// The page side of a channel connection
pub struct PageInbox {
    page_id: PageId,
    rx: mpsc::Receiver<PageRequest>,
}

impl PageInbox {
    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub async fn recv(&mut self) -> Option<PageRequest> {
        self.rx.recv().await
    }

    /// Answer every request with `handler` until the coordinator side goes away
    ///
    /// Returning `None` drops the request unanswered.
    pub fn serve<F>(mut self, mut handler: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(&Envelope) -> Option<Value> + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(request) = self.rx.recv().await {
                if let Some(answer) = handler(&request.envelope) {
                    let _ = request.reply.send(answer);
                }
            }
            debug!(page_id = %self.page_id, "PageInbox::serve: stopped");
        })
    }
}
