//! IPC message types for port communication
//!
//! Simple JSON-over-newline protocol. A port sends single-line requests;
//! the worker answers each with a response frame and pushes broadcast
//! frames on the same stream as state changes.

use serde::{Deserialize, Serialize};

use crate::worker::WorkerStatus;

/// Events broadcast to every currently attached port
///
/// Always a full state snapshot, never a delta: consumers replace their
/// local view wholesale on receipt. Raw errors never travel here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Broadcast {
    /// Worker finished initializing
    WorkerReady,

    /// An adapter connected and reported capabilities
    SpaConnected { capabilities: Vec<String> },

    /// Full roster snapshot, input order preserved
    Users(Vec<serde_json::Value>),

    /// The session was populated
    LoginSuccess { username: String },

    /// The session was closed
    LogoutSuccess,
}

/// Requests from a UI port to the worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PortRequest {
    /// Sign the current user in
    Login { username: String },

    /// Sign out and close the session
    Logout,

    /// Collect a contact under the active adapter's username field
    AddContact { identifier: String },

    /// Reload contacts and rebroadcast the roster
    RefreshContacts,

    /// Snapshot of worker state
    Status,

    /// Ping to check if the worker is alive
    Ping,

    /// Request the worker to stop gracefully
    Shutdown,
}

/// Direct replies to port requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PortResponse {
    /// Acknowledgment
    Ok,

    /// Pong response to ping
    Pong { version: String },

    /// Worker state snapshot
    Status { status: WorkerStatus },

    /// Error response
    Error { message: String },
}

/// A single outbound frame: either a reply or a pushed broadcast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PortFrame {
    Response(PortResponse),
    Broadcast(Broadcast),
}
