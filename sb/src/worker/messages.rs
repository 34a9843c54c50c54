//! Worker actor messages
//!
//! Commands and responses for the actor pattern.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

use contactstore::Contact;

use crate::ipc::Broadcast;
use crate::router::PortId;
use crate::session::Session;
use crate::spa::SpaEvent;

/// Errors from worker operations
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Contact store error: {0}")]
    ContactStore(#[from] contactstore::StoreError),

    #[error("SPA store error: {0}")]
    SpaStore(#[from] spastore::StoreError),

    #[error("Worker channel closed")]
    ChannelClosed,
}

/// Response from worker operations
pub type WorkerResponse<T> = Result<T, WorkerError>;

/// Snapshot of worker state for status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub initialized: bool,
    pub session: Session,
    pub spa_count: usize,
    pub connected_spas: usize,
    pub roster_size: usize,
}

/// Commands sent to the worker actor
#[derive(Debug)]
pub enum WorkerRequest {
    /// Load and connect every stored SPA, then announce readiness
    Initialize { reply: oneshot::Sender<()> },

    /// Load and connect every stored SPA (standalone barrier)
    LoadSpas { reply: oneshot::Sender<()> },

    /// Reset session and roster, close the contact store handle
    CloseSession { reply: oneshot::Sender<()> },

    /// Read all contacts, recompute and broadcast the roster
    LoadContacts {
        reply: oneshot::Sender<WorkerResponse<Vec<Contact>>>,
    },

    /// Store a single collected contact
    CollectContact {
        identifier: String,
        reply: oneshot::Sender<WorkerResponse<()>>,
    },

    /// Replace all stored contacts tagged with a source
    UpdateContactsFromSource {
        contacts: Vec<Contact>,
        source: String,
        reply: oneshot::Sender<WorkerResponse<()>>,
    },

    /// Recompute the roster from the given contacts and broadcast it
    UpdateContactList {
        contacts: Vec<Contact>,
        reply: oneshot::Sender<()>,
    },

    /// Sign the current user in
    Login {
        username: String,
        reply: oneshot::Sender<()>,
    },

    /// Sign out and close the session
    Logout { reply: oneshot::Sender<()> },

    /// Snapshot of worker state
    GetStatus { reply: oneshot::Sender<WorkerStatus> },

    /// Attach a UI port to receive broadcasts
    AttachPort {
        tx: mpsc::Sender<Broadcast>,
        reply: oneshot::Sender<PortId>,
    },

    /// Detach a UI port
    DetachPort { id: PortId },

    /// Subscribe to the diagnostics channel
    WatchErrors {
        reply: oneshot::Sender<broadcast::Receiver<String>>,
    },

    /// Inbound adapter notification (internal, from event forwarders)
    SpaEvent {
        generation: u64,
        spa: String,
        event: SpaEvent,
    },

    /// Shutdown the worker
    Shutdown,
}
