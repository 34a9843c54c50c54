//! Main worker task implementation
//!
//! The worker is the coordination core: it owns the session, the roster,
//! the live adapter instances, and the store handles, and it is the only
//! place any of them are mutated. Ports and adapters reach it exclusively
//! through messages, so completions interleave on one cooperative loop.

use std::collections::HashSet;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use contactstore::{Contact, ContactStore};
use spastore::{SpaSpec, SpaStore};

use super::handle::WorkerHandle;
use super::messages::{WorkerError, WorkerRequest, WorkerStatus};
use crate::config::WorkerConfig;
use crate::ipc::Broadcast;
use crate::roster::Roster;
use crate::router::Router;
use crate::session::{Presence, Session};
use crate::spa::{Spa, SpaError, SpaEvent};

/// Factory producing adapter instances from stored configurations
///
/// Injectable so tests can substitute controllable adapters for the real
/// ones behind `spa::instantiate`.
pub type SpaFactory = Box<dyn Fn(&SpaSpec) -> Result<Box<dyn Spa>, SpaError> + Send>;

/// A loaded adapter instance with its originating configuration
struct SpaSlot {
    spec: SpaSpec,
    spa: Box<dyn Spa>,
}

/// The worker actor
pub struct Worker {
    config: WorkerConfig,
    tx: mpsc::Sender<WorkerRequest>,
    rx: mpsc::Receiver<WorkerRequest>,
    factory: SpaFactory,
    contacts: ContactStore,
    spa_store: SpaStore,
    router: Router,
    session: Session,
    roster: Roster,
    /// Identifiers adapters currently report as live
    live: HashSet<String>,
    spas: Vec<SpaSlot>,
    /// Bumped on close_session; stale adapter events are discarded
    generation: u64,
    initialized: bool,
}

impl Worker {
    /// Create a worker using the default adapter factory
    pub fn new(config: WorkerConfig, contacts: ContactStore, spa_store: SpaStore) -> Self {
        Self::with_factory(config, contacts, spa_store, Box::new(crate::spa::instantiate))
    }

    /// Create a worker with an injected adapter factory
    pub fn with_factory(config: WorkerConfig, contacts: ContactStore, spa_store: SpaStore, factory: SpaFactory) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self {
            config,
            tx,
            rx,
            factory,
            contacts,
            spa_store,
            router: Router::new(),
            session: Session::new(),
            roster: Roster::new(),
            live: HashSet::new(),
            spas: Vec::new(),
            generation: 0,
            initialized: false,
        }
    }

    /// Create a handle for sending requests to this worker
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle::new(self.tx.clone())
    }

    /// Run the worker task
    ///
    /// This consumes the worker and runs until shutdown is requested.
    pub async fn run(mut self) {
        info!("Worker started");

        while let Some(req) = self.rx.recv().await {
            match req {
                WorkerRequest::Initialize { reply } => {
                    self.initialize().await;
                    let _ = reply.send(());
                }

                WorkerRequest::LoadSpas { reply } => {
                    self.load_spas().await;
                    let _ = reply.send(());
                }

                WorkerRequest::CloseSession { reply } => {
                    self.close_session();
                    let _ = reply.send(());
                }

                WorkerRequest::LoadContacts { reply } => {
                    let _ = reply.send(self.load_contacts());
                }

                WorkerRequest::CollectContact { identifier, reply } => {
                    let _ = reply.send(self.collect_contact(&identifier));
                }

                WorkerRequest::UpdateContactsFromSource { contacts, source, reply } => {
                    let _ = reply.send(self.update_contacts_from_source(&contacts, &source));
                }

                WorkerRequest::UpdateContactList { contacts, reply } => {
                    self.update_contact_list(&contacts);
                    let _ = reply.send(());
                }

                WorkerRequest::Login { username, reply } => {
                    self.login(&username).await;
                    let _ = reply.send(());
                }

                WorkerRequest::Logout { reply } => {
                    self.logout();
                    let _ = reply.send(());
                }

                WorkerRequest::GetStatus { reply } => {
                    let _ = reply.send(self.status());
                }

                WorkerRequest::AttachPort { tx, reply } => {
                    let _ = reply.send(self.router.attach(tx));
                }

                WorkerRequest::DetachPort { id } => {
                    self.router.detach(id);
                }

                WorkerRequest::WatchErrors { reply } => {
                    let _ = reply.send(self.router.watch_errors());
                }

                WorkerRequest::SpaEvent { generation, spa, event } => {
                    self.apply_spa_event(generation, &spa, event);
                }

                WorkerRequest::Shutdown => {
                    info!("Worker shutting down");
                    break;
                }
            }
        }

        info!("Worker stopped");
    }

    /// Load and connect every stored SPA, then announce readiness
    async fn initialize(&mut self) {
        debug!("Worker::initialize");
        self.load_spas().await;
        self.initialized = true;
        self.on_initialization_complete().await;
    }

    /// Instantiate and connect all stored adapters
    ///
    /// Fan-out/fan-in: every connect attempt runs concurrently and all of
    /// them are waited on — settled, not raced. A failing adapter stays
    /// disconnected and never blocks the barrier.
    async fn load_spas(&mut self) {
        let specs = match self.spa_store.all() {
            Ok(specs) => specs,
            Err(e) => {
                self.router.error(&WorkerError::SpaStore(e));
                Vec::new()
            }
        };

        let mut slots = Vec::new();
        for spec in specs {
            match (self.factory)(&spec) {
                Ok(spa) => slots.push(SpaSlot { spec, spa }),
                Err(e) => self.router.error(&e),
            }
        }

        let attempts = slots.iter_mut().map(|slot| {
            let name = slot.spec.name.clone();
            let credentials = slot.spec.credentials.clone();
            async move { (name, slot.spa.connect(&credentials).await) }
        });

        for (name, result) in join_all(attempts).await {
            match result {
                Ok(()) => info!(spa = %name, "SPA connected"),
                Err(e) => warn!(spa = %name, error = %e, "SPA connect failed"),
            }
        }

        for slot in &slots {
            self.spawn_event_forwarder(&slot.spec.name, slot.spa.subscribe());
        }

        self.spas = slots;
        debug!(count = self.spas.len(), "SPAs loaded");
    }

    /// Pipe an adapter's event stream into the actor, stamped with the
    /// current generation
    fn spawn_event_forwarder(&self, spa: &str, mut events: broadcast::Receiver<SpaEvent>) {
        let tx = self.tx.clone();
        let generation = self.generation;
        let spa = spa.to_string();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let forwarded = WorkerRequest::SpaEvent {
                            generation,
                            spa: spa.clone(),
                            event,
                        };
                        if tx.send(forwarded).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(spa = %spa, skipped, "SPA event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn on_initialization_complete(&mut self) {
        self.router.send(Broadcast::WorkerReady);

        let Some(active) = self.spas.iter().position(|slot| slot.spa.connected()) else {
            return;
        };

        // Push the current session upstream so the service can announce it
        if let Err(e) = self.spas[active].spa.announce(&self.session).await {
            self.router.error(&e);
        }

        let capabilities = self.spas[active].spa.capabilities().to_vec();
        if !capabilities.is_empty() {
            self.router.send(Broadcast::SpaConnected { capabilities });
        }

        let payload = self.roster.to_payload(self.username_field_key());
        self.router.send(Broadcast::Users(payload));
    }

    /// The active adapter's canonical contact attribute
    fn username_field_key(&self) -> &str {
        self.spas
            .iter()
            .find(|slot| slot.spa.connected())
            .or_else(|| self.spas.first())
            .map(|slot| slot.spa.username_field_key())
            .unwrap_or(&self.config.default_username_field)
    }

    /// Reset session and roster; the store close is fire-and-forget
    fn close_session(&mut self) {
        debug!("Worker::close_session");
        self.session.reset();
        self.roster.reset();
        self.live.clear();
        self.generation += 1;
        self.contacts.close();
    }

    /// Read all contacts, recompute and broadcast the roster
    ///
    /// A store failure is reported on the diagnostics channel and returned
    /// to the caller; no users broadcast goes out for that call.
    fn load_contacts(&mut self) -> Result<Vec<Contact>, WorkerError> {
        match self.contacts.all() {
            Ok(contacts) => {
                self.update_contact_list(&contacts);
                Ok(contacts)
            }
            Err(e) => {
                let err = WorkerError::ContactStore(e);
                self.router.error(&err);
                Err(err)
            }
        }
    }

    fn update_contact_list(&mut self, contacts: &[Contact]) {
        self.roster.rebuild(contacts, &self.live);
        let payload = self.roster.to_payload(self.username_field_key());
        self.router.send(Broadcast::Users(payload));
    }

    fn collect_contact(&mut self, identifier: &str) -> Result<(), WorkerError> {
        debug!(identifier, "Worker::collect_contact");
        self.contacts.add(&Contact::new(identifier))?;
        Ok(())
    }

    fn update_contacts_from_source(&mut self, contacts: &[Contact], source: &str) -> Result<(), WorkerError> {
        self.contacts.replace_source_contacts(contacts, source)?;
        Ok(())
    }

    async fn login(&mut self, username: &str) {
        info!(username, "Worker::login");
        self.session.sign_in(username);

        if let Some(active) = self.spas.iter().find(|slot| slot.spa.connected())
            && let Err(e) = active.spa.announce(&self.session).await
        {
            self.router.error(&e);
        }

        self.router.send(Broadcast::LoginSuccess {
            username: username.to_string(),
        });

        // Errors are already reported on the diagnostics channel
        let _ = self.load_contacts();
    }

    fn logout(&mut self) {
        info!("Worker::logout");
        self.close_session();
        self.router.send(Broadcast::LogoutSuccess);
    }

    fn apply_spa_event(&mut self, generation: u64, spa: &str, event: SpaEvent) {
        if generation != self.generation {
            debug!(spa, generation, current = self.generation, "Discarding stale SPA event");
            return;
        }

        match event {
            SpaEvent::Presence { identifier, presence } => {
                debug!(spa, %identifier, presence = presence.as_str(), "Presence update");
                match presence {
                    Presence::Connected => {
                        self.live.insert(identifier.clone());
                    }
                    Presence::Disconnected => {
                        self.live.remove(&identifier);
                    }
                }
                if self.roster.set_presence(&identifier, presence) {
                    let payload = self.roster.to_payload(self.username_field_key());
                    self.router.send(Broadcast::Users(payload));
                }
            }

            SpaEvent::Contacts { source, contacts } => {
                debug!(spa, source = %source, count = contacts.len(), "Contacts pushed");
                if let Err(e) = self.contacts.replace_source_contacts(&contacts, &source) {
                    self.router.error(&WorkerError::ContactStore(e));
                    return;
                }
                let _ = self.load_contacts();
            }

            SpaEvent::Disconnected => {
                warn!(spa, "SPA disconnected");
            }
        }
    }

    fn status(&self) -> WorkerStatus {
        WorkerStatus {
            initialized: self.initialized,
            session: self.session.clone(),
            spa_count: self.spas.len(),
            connected_spas: self.spas.iter().filter(|slot| slot.spa.connected()).count(),
            roster_size: self.roster.len(),
        }
    }
}
