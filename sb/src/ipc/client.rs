//! IPC client for talking to a running worker
//!
//! Used by the CLI and tests. Each request opens a fresh connection,
//! writes one request line, and reads frames until the matching response
//! arrives (broadcasts pushed in between are skipped).

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result, eyre};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::get_socket_path;
use super::messages::{PortFrame, PortRequest, PortResponse};
use crate::worker::WorkerStatus;

/// How long to wait for a response before giving up
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the worker's IPC socket
pub struct PortClient {
    socket_path: PathBuf,
}

impl Default for PortClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PortClient {
    /// Create a client using the default socket path
    pub fn new() -> Self {
        Self {
            socket_path: get_socket_path(),
        }
    }

    /// Create a client with a custom socket path (for testing)
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Send a request and wait for its response
    pub async fn request(&self, request: &PortRequest) -> Result<PortResponse> {
        debug!(?request, "PortClient::request");
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .context("Failed to connect to worker socket")?;
        let (read_half, mut write_half) = stream.into_split();

        let line = serde_json::to_string(request).context("Failed to serialize request")?;
        write_half.write_all(line.as_bytes()).await.context("Failed to write request")?;
        write_half.write_all(b"\n").await.context("Failed to write newline")?;
        write_half.flush().await.context("Failed to flush request")?;

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        let response = tokio::time::timeout(REQUEST_TIMEOUT, async {
            loop {
                line.clear();
                let bytes_read = reader.read_line(&mut line).await.context("Failed to read response")?;
                if bytes_read == 0 {
                    return Err(eyre!("Connection closed before response"));
                }
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<PortFrame>(line.trim()).context("Failed to parse response")? {
                    PortFrame::Response(response) => return Ok(response),
                    // Broadcasts pushed before our reply are not for us here
                    PortFrame::Broadcast(_) => continue,
                }
            }
        })
        .await
        .map_err(|_| eyre!("Timed out waiting for worker response"))??;

        debug!(?response, "PortClient::request: got response");
        Ok(response)
    }

    /// Ping the worker, returning its version
    pub async fn ping(&self) -> Result<String> {
        match self.request(&PortRequest::Ping).await? {
            PortResponse::Pong { version } => Ok(version),
            other => Err(eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Sign the current user in
    pub async fn login(&self, username: &str) -> Result<()> {
        let request = PortRequest::Login {
            username: username.to_string(),
        };
        expect_ok(self.request(&request).await?)
    }

    /// Sign out and close the session
    pub async fn logout(&self) -> Result<()> {
        expect_ok(self.request(&PortRequest::Logout).await?)
    }

    /// Collect a contact
    pub async fn add_contact(&self, identifier: &str) -> Result<()> {
        let request = PortRequest::AddContact {
            identifier: identifier.to_string(),
        };
        expect_ok(self.request(&request).await?)
    }

    /// Reload contacts and rebroadcast the roster
    pub async fn refresh_contacts(&self) -> Result<()> {
        expect_ok(self.request(&PortRequest::RefreshContacts).await?)
    }

    /// Fetch a snapshot of worker state
    pub async fn status(&self) -> Result<WorkerStatus> {
        match self.request(&PortRequest::Status).await? {
            PortResponse::Status { status } => Ok(status),
            PortResponse::Error { message } => Err(eyre!(message)),
            other => Err(eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Ask the worker to stop gracefully
    pub async fn shutdown(&self) -> Result<()> {
        expect_ok(self.request(&PortRequest::Shutdown).await?)
    }
}

fn expect_ok(response: PortResponse) -> Result<()> {
    match response {
        PortResponse::Ok => Ok(()),
        PortResponse::Error { message } => Err(eyre!(message)),
        other => Err(eyre!("Unexpected response: {:?}", other)),
    }
}
