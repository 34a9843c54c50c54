//! Service Provider Adapters
//!
//! Each SPA bridges the worker to one external signaling/presence service.
//! The worker is polymorphic over the `Spa` trait and never depends on a
//! particular adapter's transport; adapters communicate back exclusively
//! through their event stream, which the worker folds into its own state.

mod http;

pub use http::HttpSpa;

use async_trait::async_trait;
use contactstore::Contact;
use serde::{Deserialize, Serialize};
use spastore::SpaSpec;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::session::{Presence, Session};

/// Errors from adapter construction and operations
#[derive(Debug, Error)]
pub enum SpaError {
    #[error("Invalid SPA configuration '{name}': {reason}")]
    InvalidSpec { name: String, reason: String },

    #[error("Unsupported source locator: {0}")]
    UnsupportedLocator(String),

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("API error {status}")]
    Api { status: u16 },

    #[error("Not connected")]
    NotConnected,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Inbound notifications from an adapter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SpaEvent {
    /// A contact identifier went live or dropped off
    Presence { identifier: String, presence: Presence },

    /// The service pushed its full contact list
    Contacts { source: String, contacts: Vec<Contact> },

    /// The adapter lost its upstream connection
    Disconnected,
}

/// Capability set every adapter exposes to the worker
#[async_trait]
pub trait Spa: Send + Sync {
    /// Establish the upstream connection using stored credentials
    async fn connect(&mut self, credentials: &serde_json::Value) -> Result<(), SpaError>;

    /// Whether the upstream connection is currently established
    fn connected(&self) -> bool;

    /// Capabilities the remote service reported on connect
    fn capabilities(&self) -> &[String];

    /// Which contact attribute this adapter treats as canonical
    fn username_field_key(&self) -> &str;

    /// Subscribe to inbound presence/contact notifications
    fn subscribe(&self) -> broadcast::Receiver<SpaEvent>;

    /// Push the current session upstream so the service can announce presence
    async fn announce(&self, session: &Session) -> Result<(), SpaError>;
}

/// Validating factory: build an adapter instance from a stored configuration
///
/// Contract violations (missing fields, unsupported locator schemes) fail
/// fast here with descriptive errors rather than surfacing later at
/// connect time.
pub fn instantiate(spec: &SpaSpec) -> Result<Box<dyn Spa>, SpaError> {
    if spec.name.trim().is_empty() {
        return Err(SpaError::InvalidSpec {
            name: spec.source_locator.clone(),
            reason: "missing name".to_string(),
        });
    }
    if spec.source_locator.trim().is_empty() {
        return Err(SpaError::InvalidSpec {
            name: spec.name.clone(),
            reason: "missing source locator".to_string(),
        });
    }

    if spec.source_locator.starts_with("http://") || spec.source_locator.starts_with("https://") {
        return Ok(Box::new(HttpSpa::new(&spec.name, &spec.source_locator)?));
    }

    Err(SpaError::UnsupportedLocator(spec.source_locator.clone()))
}
