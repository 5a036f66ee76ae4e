//! IPC frame type and line helpers
//!
//! Simple JSON-over-newline protocol. Each frame is a single line of JSON followed by `\n`.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{Envelope, Sender};

/// Largest line accepted in either direction
pub const MAX_LINE_SIZE: usize = 4 * 1024 * 1024;

/// One inbound message with the identity of its sender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub sender: Sender,
    /// Raw payload; the coordinator validates it
    pub message: Value,
}

impl Frame {
    pub fn new(sender: Sender, envelope: &Envelope) -> Self {
        Self {
            sender,
            message: envelope.to_value(),
        }
    }
}

/// Read one JSON line; `None` at end of stream
///
/// At most `MAX_LINE_SIZE + 1` bytes are buffered; a longer line is an error.
pub async fn read_json_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Value>> {
    let mut line = String::new();
    let mut limited = (&mut *reader).take(MAX_LINE_SIZE as u64 + 1);
    let bytes_read = limited.read_line(&mut line).await.context("Failed to read IPC line")?;
    if bytes_read == 0 {
        return Ok(None);
    }
    if bytes_read > MAX_LINE_SIZE {
        return Err(eyre::eyre!("Message too large: over {} bytes", MAX_LINE_SIZE));
    }
    let value = serde_json::from_str(line.trim()).context("Failed to parse IPC line")?;
    Ok(Some(value))
}

/// Write one value as a JSON line and flush
pub async fn write_json_line<W: AsyncWrite + Unpin, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).context("Failed to serialize IPC line")?;
    writer.write_all(json.as_bytes()).await.context("Failed to write IPC line")?;
    writer.write_all(b"\n").await.context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush IPC line")?;
    Ok(())
}
