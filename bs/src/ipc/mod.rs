//! Inter-Process Communication over a Unix Domain Socket
//!
//! Control surfaces (the `bs` CLI) and page links connect to the
//! coordinator's socket. Every line on the wire is one JSON value.
//!
//! - A surface connection sends one [`Frame`] and reads one reply line, or
//!   sees the connection close when the coordinator ignored the message.
//!   `surface.watch` instead keeps the connection open and streams pushes.
//! - A page connection starts with a `page.hello` frame. After the ack the
//!   same connection carries coordinator requests to the page, one line in,
//!   one line out. Page reports (`page.event`, ...) use their own short
//!   connections.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;
pub mod pages;

pub use client::{CoordinatorClient, WatchStream};
pub use listener::{cleanup_socket, create_listener, create_listener_at, serve};
pub use messages::Frame;
pub use pages::{PageLink, SocketPages};

/// Get the socket path for coordinator IPC
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("botsync")
        .join("coordinator.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_coordinator_sock() {
        let path = get_socket_path();
        assert!(path.ends_with("botsync/coordinator.sock"));
    }
}
