//! IPC listener for the coordinator side
//!
//! Provides helpers for creating the Unix Domain Socket listener and the
//! accept loop that feeds frames to the coordinator.

use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::get_socket_path;
use super::messages::{Frame, read_json_line, write_json_line};
use super::pages::SocketPages;
use crate::coordinator::CoordinatorHandle;
use crate::protocol::{Ack, MessageId, Sender};

/// Create and bind a Unix Domain Socket listener at the default path
pub fn create_listener() -> Result<(UnixListener, PathBuf)> {
    let socket_path = get_socket_path();
    create_listener_at(&socket_path)
}

/// Create a listener at a specific path
///
/// Handles cleanup of stale socket files from previous runs.
pub fn create_listener_at(socket_path: &PathBuf) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener: socket bound successfully");

    Ok((listener, socket_path.clone()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &PathBuf) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Accept connections until `shutdown_rx` fires
pub async fn serve(
    listener: UnixListener,
    handle: CoordinatorHandle,
    pages: Arc<SocketPages>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    info!("IPC listener accepting connections");
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        debug!("serve: IPC connection accepted");
                        let handle = handle.clone();
                        let pages = pages.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handle, pages).await {
                                warn!(error = %e, "serve: IPC connection error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "serve: IPC accept error");
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                debug!("serve: shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

/// Handle a single IPC connection
async fn handle_connection(stream: UnixStream, handle: CoordinatorHandle, pages: Arc<SocketPages>) -> Result<()> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(first) = read_json_line(&mut reader).await? else {
        debug!("handle_connection: closed before first frame");
        return Ok(());
    };
    let frame: Frame = serde_json::from_value(first).context("Failed to parse IPC frame")?;
    let id = frame.message.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    debug!(sender = %frame.sender, %id, "handle_connection: frame received");

    match (&frame.sender, id.as_str()) {
        (Sender::Surface, id) if id == MessageId::SurfaceWatch.as_str() => {
            let mut pushes = handle.subscribe();
            write_json_line(&mut writer, &Ack::ok()).await?;
            loop {
                match pushes.recv().await {
                    Ok(push) => {
                        if write_json_line(&mut writer, &push.to_envelope().to_value()).await.is_err() {
                            debug!("handle_connection: watcher went away");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(n, "handle_connection: watcher lagged behind pushes");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }

        (Sender::Page { page_id }, id) if id == MessageId::PageHello.as_str() => {
            let page_id = page_id.clone();
            write_json_line(&mut writer, &Ack::ok()).await?;
            pages.attach(page_id, reader, writer).await;
            // The coordinator may now query the page over the attached link
            handle.deliver(frame.sender, frame.message).await?;
        }

        _ => {
            if let Some(reply) = handle.deliver(frame.sender, frame.message).await? {
                write_json_line(&mut writer, &reply).await?;
            }
        }
    }
    Ok(())
}
