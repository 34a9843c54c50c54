//! ContactStore - persistent contact records for the switchboard worker
//!
//! Every contact is tagged with an originating source (an SPA name, or
//! `"local"` for manually collected contacts) and is uniquely identified by
//! `(identifier, source)`. Records from different sources are never merged
//! here; the worker's roster does the reconciliation.
//!
//! # Example
//!
//! ```ignore
//! use contactstore::{Contact, ContactStore};
//!
//! let mut store = ContactStore::open("contacts.db")?;
//! store.add(&Contact::new("andreas"))?;
//! let contacts = store.all()?;
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::{Contact, ContactStore, DEFAULT_SOURCE, StoreError};
