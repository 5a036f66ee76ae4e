//! IPC client for talking to the coordinator
//!
//! Used by the CLI as a control surface, and as a page sender for manual
//! event injection.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use super::get_socket_path;
use super::messages::{Frame, read_json_line, write_json_line};
use crate::protocol::{Envelope, MessageId, PageId, Sender};

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for talking to the coordinator via IPC
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    socket_path: PathBuf,
    timeout: Duration,
    sender: Sender,
}

impl Default for CoordinatorClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorClient {
    /// Create a surface client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
            sender: Sender::Surface,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send as a page instead of the control surface
    pub fn as_page(mut self, page_id: PageId) -> Self {
        self.sender = Sender::Page { page_id };
        self
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    async fn open(&self) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to coordinator socket")?;
        let (read_half, writer) = stream.into_split();
        Ok((BufReader::new(read_half), writer))
    }

    /// Send one envelope and wait for the reply
    ///
    /// `Ok(None)` means the coordinator ignored the message.
    pub async fn request(&self, envelope: &Envelope) -> Result<Option<Value>> {
        debug!(socket_path = ?self.socket_path, id = %envelope.id, "CoordinatorClient::request: called");
        let (mut reader, mut writer) = self.open().await?;
        let frame = Frame::new(self.sender.clone(), envelope);

        tokio::time::timeout(self.timeout, write_json_line(&mut writer, &frame))
            .await
            .context("Write timeout")??;

        let reply = tokio::time::timeout(self.timeout, read_json_line(&mut reader))
            .await
            .context("Read timeout")??;
        debug!(?reply, "CoordinatorClient::request: received reply");
        Ok(reply)
    }

    /// Like [`request`](Self::request) but an ignored message is an error
    pub async fn request_required(&self, envelope: &Envelope) -> Result<Value> {
        self.request(envelope)
            .await?
            .ok_or_else(|| eyre::eyre!("Coordinator ignored {}", envelope.id))
    }

    /// Subscribe to run-state and badge pushes
    pub async fn watch(&self) -> Result<WatchStream> {
        debug!("CoordinatorClient::watch: called");
        let (mut reader, mut writer) = self.open().await?;
        let frame = Frame::new(Sender::Surface, &Envelope::new(MessageId::SurfaceWatch));
        tokio::time::timeout(self.timeout, write_json_line(&mut writer, &frame))
            .await
            .context("Write timeout")??;
        tokio::time::timeout(self.timeout, read_json_line(&mut reader))
            .await
            .context("Read timeout")??
            .ok_or_else(|| eyre::eyre!("Coordinator refused watch"))?;
        Ok(WatchStream {
            reader,
            _writer: writer,
        })
    }
}

/// Open `surface.watch` connection
pub struct WatchStream {
    reader: BufReader<OwnedReadHalf>,
    _writer: OwnedWriteHalf,
}

impl WatchStream {
    /// Next push; `None` when the coordinator goes away
    pub async fn next(&mut self) -> Result<Option<Envelope>> {
        loop {
            let Some(payload) = read_json_line(&mut self.reader).await? else {
                return Ok(None);
            };
            match Envelope::parse(&payload) {
                Ok(Some(envelope)) => return Ok(Some(envelope)),
                _ => debug!(%payload, "WatchStream::next: skipping unreadable push"),
            }
        }
    }
}
