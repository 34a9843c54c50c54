//! IPC listener for the worker side
//!
//! Accepts UI port connections on a Unix Domain Socket. Every connection
//! attaches to the worker's port set on accept and detaches when it
//! closes, so a broadcast reaches exactly the ports connected at the
//! moment it is sent.

use std::path::PathBuf;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::get_socket_path;
use super::messages::{Broadcast, PortFrame, PortRequest, PortResponse};
use crate::daemon::VERSION;
use crate::worker::WorkerHandle;

/// Maximum request size
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Create and bind a Unix Domain Socket listener for the worker
///
/// Handles cleanup of stale socket files from previous runs.
pub fn create_listener() -> Result<(UnixListener, PathBuf)> {
    let socket_path = get_socket_path();
    create_listener_at(&socket_path)
}

/// Create a listener at a specific path (for testing)
pub fn create_listener_at(socket_path: &PathBuf) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener: creating IPC socket");

    // Ensure parent directory exists
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    // Clean up stale socket if exists
    if socket_path.exists() {
        debug!(?socket_path, "create_listener: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    // Bind the socket
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

/// Accept port connections until the listener fails
pub async fn serve(listener: UnixListener, worker: WorkerHandle, port_buffer: usize) -> Result<()> {
    loop {
        let (stream, _) = listener.accept().await.context("Failed to accept port connection")?;
        let worker = worker.clone();

        tokio::spawn(async move {
            let conn_id = Uuid::now_v7();
            debug!(%conn_id, "Port connection opened");
            match handle_connection(stream, worker, port_buffer).await {
                Ok(()) => debug!(%conn_id, "Port connection closed"),
                Err(e) => debug!(%conn_id, error = %e, "Port connection closed with error"),
            }
        });
    }
}

/// Drive a single port connection
///
/// The read half carries requests; a writer task multiplexes request
/// responses and worker broadcasts onto the write half.
async fn handle_connection(stream: UnixStream, worker: WorkerHandle, port_buffer: usize) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();

    let (bcast_tx, mut bcast_rx) = mpsc::channel::<Broadcast>(port_buffer);
    let port_id = worker.attach_port(bcast_tx).await?;

    let (frame_tx, mut frame_rx) = mpsc::channel::<PortFrame>(port_buffer);

    let writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(frame) = frame_rx.recv() => frame,
                Some(event) = bcast_rx.recv() => PortFrame::Broadcast(event),
                else => break,
            };

            let line = match serde_json::to_string(&frame) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize port frame");
                    continue;
                }
            };

            if write_half.write_all(line.as_bytes()).await.is_err()
                || write_half.write_all(b"\n").await.is_err()
                || write_half.flush().await.is_err()
            {
                break;
            }
        }
    });

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    let result = loop {
        line.clear();
        let bytes_read = match reader.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => break Err(eyre::Report::from(e)),
        };

        // EOF: the port went away
        if bytes_read == 0 {
            break Ok(());
        }
        if bytes_read > MAX_MESSAGE_SIZE {
            break Err(eyre::eyre!("Message too large: {} bytes", bytes_read));
        }
        if line.trim().is_empty() {
            continue;
        }

        let request: PortRequest = match serde_json::from_str(line.trim()) {
            Ok(request) => request,
            Err(e) => {
                let response = PortResponse::Error {
                    message: format!("Invalid request: {e}"),
                };
                if frame_tx.send(PortFrame::Response(response)).await.is_err() {
                    break Ok(());
                }
                continue;
            }
        };
        debug!(?request, "Port request");

        let is_shutdown = matches!(request, PortRequest::Shutdown);
        let response = dispatch(&worker, request).await;
        if frame_tx.send(PortFrame::Response(response)).await.is_err() {
            break Ok(());
        }
        if is_shutdown {
            break Ok(());
        }
    };

    let _ = worker.detach_port(port_id).await;
    writer.abort();
    result
}

/// Map a port request to a worker operation and build the reply
async fn dispatch(worker: &WorkerHandle, request: PortRequest) -> PortResponse {
    match request {
        PortRequest::Login { username } => match worker.login(&username).await {
            Ok(()) => PortResponse::Ok,
            Err(e) => PortResponse::Error { message: e.to_string() },
        },

        PortRequest::Logout => match worker.logout().await {
            Ok(()) => PortResponse::Ok,
            Err(e) => PortResponse::Error { message: e.to_string() },
        },

        PortRequest::AddContact { identifier } => match worker.collect_contact(&identifier).await {
            Ok(()) => PortResponse::Ok,
            Err(e) => PortResponse::Error { message: e.to_string() },
        },

        PortRequest::RefreshContacts => match worker.load_contacts().await {
            Ok(_) => PortResponse::Ok,
            Err(e) => PortResponse::Error { message: e.to_string() },
        },

        PortRequest::Status => match worker.status().await {
            Ok(status) => PortResponse::Status { status },
            Err(e) => PortResponse::Error { message: e.to_string() },
        },

        PortRequest::Ping => PortResponse::Pong {
            version: VERSION.to_string(),
        },

        PortRequest::Shutdown => match worker.shutdown().await {
            Ok(()) => PortResponse::Ok,
            Err(e) => PortResponse::Error { message: e.to_string() },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::ipc::PortClient;
    use crate::worker::Worker;
    use contactstore::ContactStore;
    use spastore::SpaStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn spawn_worker(temp: &TempDir) -> WorkerHandle {
        let contacts = ContactStore::open(temp.path().join("contacts.db")).unwrap();
        let spa_store = SpaStore::open(temp.path().join("spa.jsonl")).unwrap();
        let worker = Worker::new(WorkerConfig::default(), contacts, spa_store);
        let handle = worker.handle();
        tokio::spawn(worker.run());
        handle
    }

    #[tokio::test]
    async fn test_create_listener_creates_parent_dir() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("subdir").join("worker.sock");

        let result = create_listener_at(&socket_path);
        assert!(result.is_ok());

        let (_, path) = result.unwrap();
        assert_eq!(path, socket_path);
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_create_listener_removes_stale_socket() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("worker.sock");

        // Create a stale file
        std::fs::write(&socket_path, "stale").unwrap();

        let result = create_listener_at(&socket_path);
        assert!(result.is_ok());
    }

    #[test]
    fn test_cleanup_socket_removes_file() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("worker.sock");

        std::fs::write(&socket_path, "test").unwrap();
        assert!(socket_path.exists());

        cleanup_socket(&socket_path);
        assert!(!socket_path.exists());
    }

    #[test]
    fn test_cleanup_socket_handles_missing_file() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("nonexistent.sock");

        // Should not panic
        cleanup_socket(&socket_path);
    }

    #[tokio::test]
    async fn test_end_to_end_ping_pong() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("worker.sock");

        let handle = spawn_worker(&temp);
        let (listener, _) = create_listener_at(&socket_path).unwrap();
        tokio::spawn(serve(listener, handle, 64));

        tokio::time::sleep(Duration::from_millis(10)).await;

        let client = PortClient::with_socket_path(socket_path);
        let version = client.ping().await.unwrap();
        assert_eq!(version, VERSION);
    }

    #[tokio::test]
    async fn test_login_over_ipc_broadcasts_to_other_port() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("worker.sock");

        let handle = spawn_worker(&temp);
        let (listener, _) = create_listener_at(&socket_path).unwrap();
        tokio::spawn(serve(listener, handle, 64));

        tokio::time::sleep(Duration::from_millis(10)).await;

        // A second port just listens for broadcasts
        let watcher = UnixStream::connect(&socket_path).await.unwrap();
        let (watch_read, _watch_write) = watcher.into_split();
        let mut watch_lines = BufReader::new(watch_read).lines();

        tokio::time::sleep(Duration::from_millis(10)).await;

        let client = PortClient::with_socket_path(socket_path);
        client.login("andreas").await.unwrap();

        // login-success then users land on the watching port
        let line = tokio::time::timeout(Duration::from_secs(5), watch_lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame: PortFrame = serde_json::from_str(&line).unwrap();
        assert_eq!(
            frame,
            PortFrame::Broadcast(Broadcast::LoginSuccess {
                username: "andreas".to_string()
            })
        );

        let line = tokio::time::timeout(Duration::from_secs(5), watch_lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame: PortFrame = serde_json::from_str(&line).unwrap();
        assert!(matches!(frame, PortFrame::Broadcast(Broadcast::Users(_))));
    }

    #[tokio::test]
    async fn test_status_over_ipc() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("worker.sock");

        let handle = spawn_worker(&temp);
        let (listener, _) = create_listener_at(&socket_path).unwrap();
        tokio::spawn(serve(listener, handle, 64));

        tokio::time::sleep(Duration::from_millis(10)).await;

        let client = PortClient::with_socket_path(socket_path);
        let status = client.status().await.unwrap();
        assert!(!status.initialized);
        assert_eq!(status.spa_count, 0);
    }

    #[tokio::test]
    async fn test_invalid_request_gets_error_response() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("worker.sock");

        let handle = spawn_worker(&temp);
        let (listener, _) = create_listener_at(&socket_path).unwrap();
        tokio::spawn(serve(listener, handle, 64));

        tokio::time::sleep(Duration::from_millis(10)).await;

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(b"not json\n").await.unwrap();
        write_half.flush().await.unwrap();

        let mut lines = BufReader::new(read_half).lines();
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame: PortFrame = serde_json::from_str(&line).unwrap();
        assert!(matches!(frame, PortFrame::Response(PortResponse::Error { .. })));
    }
}
