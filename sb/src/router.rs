//! Router - broadcast fan-out to attached UI ports
//!
//! Two effects: `send` delivers an event to every port attached at the
//! moment of the call (no replay for ports attaching later), and `error`
//! reports a diagnostic out-of-band — errors never ride the broadcast
//! stream.

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, warn};

use crate::ipc::Broadcast;

/// Capacity of the diagnostics channel
const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Identifier assigned to an attached port
pub type PortId = u64;

/// The set of currently attached UI connections
#[derive(Debug, Default)]
pub struct PortSet {
    ports: HashMap<PortId, mpsc::Sender<Broadcast>>,
    next_id: PortId,
}

impl PortSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a port, returning its id
    pub fn attach(&mut self, tx: mpsc::Sender<Broadcast>) -> PortId {
        let id = self.next_id;
        self.next_id += 1;
        self.ports.insert(id, tx);
        debug!(port = id, total = self.ports.len(), "Port attached");
        id
    }

    /// Detach a port, returning whether it was attached
    pub fn detach(&mut self, id: PortId) -> bool {
        let removed = self.ports.remove(&id).is_some();
        if removed {
            debug!(port = id, total = self.ports.len(), "Port detached");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Dispatches broadcasts to the port set and reports errors out-of-band
pub struct Router {
    ports: PortSet,
    error_tx: broadcast::Sender<String>,
}

impl Router {
    pub fn new() -> Self {
        let (error_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            ports: PortSet::new(),
            error_tx,
        }
    }

    pub fn attach(&mut self, tx: mpsc::Sender<Broadcast>) -> PortId {
        self.ports.attach(tx)
    }

    pub fn detach(&mut self, id: PortId) -> bool {
        self.ports.detach(id)
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Broadcast an event to every currently attached port
    ///
    /// A port with a full buffer is skipped; a closed port is pruned.
    pub fn send(&mut self, event: Broadcast) {
        debug!(ports = self.ports.len(), "Router::send");

        let mut closed = Vec::new();
        for (id, tx) in &self.ports.ports {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(port = id, "Port buffer full, dropping broadcast");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*id);
                }
            }
        }

        for id in closed {
            self.ports.detach(id);
        }
    }

    /// Report an error on the diagnostics channel
    ///
    /// Fire-and-forget when nobody is watching, like an unobserved event
    /// bus emit.
    pub fn error(&self, err: &impl std::fmt::Display) {
        error!(%err, "Worker error");
        let _ = self.error_tx.send(err.to_string());
    }

    /// Subscribe to the diagnostics channel
    pub fn watch_errors(&self) -> broadcast::Receiver<String> {
        self.error_tx.subscribe()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_all_attached_ports() {
        let mut router = Router::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        router.attach(tx1);
        router.attach(tx2);

        router.send(Broadcast::WorkerReady);

        assert_eq!(rx1.recv().await, Some(Broadcast::WorkerReady));
        assert_eq!(rx2.recv().await, Some(Broadcast::WorkerReady));
    }

    #[tokio::test]
    async fn test_send_skips_detached_ports() {
        let mut router = Router::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let id1 = router.attach(tx1);
        router.attach(tx2);

        router.detach(id1);
        router.send(Broadcast::WorkerReady);

        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), Broadcast::WorkerReady);
    }

    #[tokio::test]
    async fn test_send_prunes_closed_ports() {
        let mut router = Router::new();
        let (tx, rx) = mpsc::channel(8);
        router.attach(tx);
        drop(rx);

        router.send(Broadcast::WorkerReady);
        assert_eq!(router.port_count(), 0);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_ports() {
        let mut router = Router::new();
        router.send(Broadcast::WorkerReady);

        let (tx, mut rx) = mpsc::channel(8);
        router.attach(tx);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_goes_to_diagnostics_not_ports() {
        let mut router = Router::new();
        let (tx, mut rx) = mpsc::channel(8);
        router.attach(tx);
        let mut errors = router.watch_errors();

        router.error(&"boom");

        assert_eq!(errors.recv().await.unwrap(), "boom");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_error_without_watchers_is_dropped() {
        let router = Router::new();
        // Must not panic with no subscribers
        router.error(&"boom");
    }
}
