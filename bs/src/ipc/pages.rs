//! Page connections over the socket
//!
//! [`SocketPages`] is the coordinator side: a registry of page links that
//! implements [`PageTransport`]. [`PageLink`] is the page side: it says
//! hello and then answers coordinator requests with a handler.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use serde_json::{Value, json};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::messages::{Frame, read_json_line, write_json_line};
use crate::protocol::{Envelope, MessageId, PageHello, PageId, Sender};
use crate::transport::{PageTransport, TransportError};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Registry of pages linked through the socket
#[derive(Default)]
pub struct SocketPages {
    links: Mutex<Vec<(PageId, Arc<Mutex<Connection>>)>>,
}

impl SocketPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take over a connection whose hello was acknowledged
    pub async fn attach(&self, page_id: PageId, reader: BufReader<OwnedReadHalf>, writer: OwnedWriteHalf) {
        debug!(%page_id, "SocketPages::attach: called");
        let connection = Arc::new(Mutex::new(Connection { reader, writer }));
        let mut links = self.links.lock().await;
        links.retain(|(id, _)| *id != page_id);
        links.push((page_id.clone(), connection));
        info!(%page_id, "Page linked");
    }

    pub async fn detach(&self, page_id: &PageId) {
        debug!(%page_id, "SocketPages::detach: called");
        self.links.lock().await.retain(|(id, _)| id != page_id);
    }
}

#[async_trait]
impl PageTransport for SocketPages {
    async fn pages(&self) -> Vec<PageId> {
        self.links.lock().await.iter().map(|(id, _)| id.clone()).collect()
    }

    async fn request(&self, page: &PageId, envelope: Envelope) -> Result<Value, TransportError> {
        debug!(%page, id = %envelope.id, "SocketPages::request: called");
        let connection = self
            .links
            .lock()
            .await
            .iter()
            .find(|(id, _)| id == page)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| TransportError::NotConnected(page.clone()))?;

        let io_error = |e: eyre::Report| TransportError::Io {
            page: page.clone(),
            reason: format!("{:#}", e),
        };

        let answer = {
            let mut conn = connection.lock().await;
            let Connection { reader, writer } = &mut *conn;
            match write_json_line(writer, &envelope.to_value()).await {
                Ok(()) => read_json_line(reader).await,
                Err(e) => Err(e),
            }
        };

        match answer {
            Ok(Some(value)) => Ok(value),
            Ok(None) => {
                warn!(%page, "Page link closed");
                self.detach(page).await;
                Err(TransportError::Closed(page.clone()))
            }
            Err(e) => {
                self.detach(page).await;
                Err(io_error(e))
            }
        }
    }
}

/// Page-side end of a socket link
pub struct PageLink {
    page_id: PageId,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl PageLink {
    /// Connect and say hello; returns once the coordinator acknowledged
    pub async fn connect(socket_path: &Path, page_id: PageId) -> Result<Self> {
        debug!(?socket_path, %page_id, "PageLink::connect: called");
        let stream = UnixStream::connect(socket_path)
            .await
            .context("Failed to connect to coordinator socket")?;
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let hello = Envelope::with_data(
            MessageId::PageHello,
            json!(PageHello {
                page_id: Some(page_id.clone())
            }),
        );
        let sender = Sender::Page {
            page_id: page_id.clone(),
        };
        write_json_line(&mut writer, &Frame::new(sender, &hello)).await?;

        match read_json_line(&mut reader).await? {
            Some(ack) if ack.get("ok").and_then(Value::as_bool) == Some(true) => {
                info!(%page_id, "Page link established");
                Ok(Self {
                    page_id,
                    reader,
                    writer,
                })
            }
            Some(other) => Err(eyre::eyre!("Coordinator refused page link: {}", other)),
            None => Err(eyre::eyre!("Coordinator closed the page link")),
        }
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    /// Answer coordinator requests until the coordinator hangs up
    pub async fn serve<F>(mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&Envelope) -> Value,
    {
        debug!(page_id = %self.page_id, "PageLink::serve: called");
        while let Some(payload) = read_json_line(&mut self.reader).await? {
            let answer = match Envelope::parse(&payload) {
                Ok(Some(envelope)) => handler(&envelope),
                Ok(None) | Err(_) => {
                    warn!(%payload, "PageLink: unreadable request");
                    Value::Null
                }
            };
            write_json_line(&mut self.writer, &answer).await?;
        }
        debug!(page_id = %self.page_id, "PageLink::serve: coordinator closed link");
        Ok(())
    }
}
