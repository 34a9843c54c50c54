//! Inter-Process Communication between UI ports and the worker
//!
//! This module provides Unix Domain Socket-based IPC. Each accepted
//! connection is attached to the worker's port set for its lifetime:
//! requests arrive as JSON lines, and the worker's broadcasts are pushed
//! back on the same stream.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::PortClient;
pub use listener::{cleanup_socket, create_listener, create_listener_at, serve};
pub use messages::{Broadcast, PortFrame, PortRequest, PortResponse};

/// Get the socket path for worker IPC
///
/// Uses the same base directory as other worker files (PID file, version file).
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("switchboard")
        .join("worker.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_worker_sock() {
        let path = get_socket_path();
        assert!(path.ends_with("switchboard/worker.sock"));
    }
}
