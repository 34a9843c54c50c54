//! WorkerHandle - client interface to the worker actor
//!
//! Cloneable; all operations are async messages with oneshot replies.

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use contactstore::Contact;

use super::messages::{WorkerError, WorkerRequest, WorkerStatus};
use crate::ipc::Broadcast;
use crate::router::PortId;

/// Handle for sending requests to the worker
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerRequest>,
}

impl WorkerHandle {
    pub(crate) fn new(tx: mpsc::Sender<WorkerRequest>) -> Self {
        Self { tx }
    }

    /// Load and connect every stored SPA, then announce readiness
    pub async fn initialize(&self) -> Result<(), WorkerError> {
        debug!("WorkerHandle::initialize");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::Initialize { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Load and connect every stored SPA without the readiness broadcasts
    ///
    /// Resolves once every instantiate+connect attempt has settled.
    pub async fn load_spas(&self) -> Result<(), WorkerError> {
        debug!("WorkerHandle::load_spas");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::LoadSpas { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Reset session and roster, close the contact store handle
    pub async fn close_session(&self) -> Result<(), WorkerError> {
        debug!("WorkerHandle::close_session");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::CloseSession { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Read all contacts, recompute and broadcast the roster
    pub async fn load_contacts(&self) -> Result<Vec<Contact>, WorkerError> {
        debug!("WorkerHandle::load_contacts");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::LoadContacts { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    /// Store a single collected contact
    pub async fn collect_contact(&self, identifier: &str) -> Result<(), WorkerError> {
        debug!(identifier, "WorkerHandle::collect_contact");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::CollectContact {
                identifier: identifier.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    /// Replace all stored contacts tagged with a source
    pub async fn update_contacts_from_source(&self, contacts: Vec<Contact>, source: &str) -> Result<(), WorkerError> {
        debug!(source, count = contacts.len(), "WorkerHandle::update_contacts_from_source");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::UpdateContactsFromSource {
                contacts,
                source: source.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    /// Recompute the roster from the given contacts and broadcast it
    pub async fn update_contact_list(&self, contacts: Vec<Contact>) -> Result<(), WorkerError> {
        debug!(count = contacts.len(), "WorkerHandle::update_contact_list");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::UpdateContactList {
                contacts,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Sign the current user in
    pub async fn login(&self, username: &str) -> Result<(), WorkerError> {
        debug!(username, "WorkerHandle::login");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::Login {
                username: username.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Sign out and close the session
    pub async fn logout(&self) -> Result<(), WorkerError> {
        debug!("WorkerHandle::logout");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::Logout { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Snapshot of worker state
    pub async fn status(&self) -> Result<WorkerStatus, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::GetStatus { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Attach a UI port to receive broadcasts
    pub async fn attach_port(&self, tx: mpsc::Sender<Broadcast>) -> Result<PortId, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::AttachPort { tx, reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Detach a UI port
    pub async fn detach_port(&self, id: PortId) -> Result<(), WorkerError> {
        self.tx
            .send(WorkerRequest::DetachPort { id })
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Subscribe to the diagnostics channel
    pub async fn watch_errors(&self) -> Result<broadcast::Receiver<String>, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::WatchErrors { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Request the worker to stop gracefully
    pub async fn shutdown(&self) -> Result<(), WorkerError> {
        debug!("WorkerHandle::shutdown");
        self.tx
            .send(WorkerRequest::Shutdown)
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Resolve once the worker task has stopped
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}
