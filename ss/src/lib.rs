//! SpaStore - persisted service provider adapter configurations
//!
//! Holds the list of enabled SPAs the worker instantiates at load time.
//! Each configuration carries a name, the source locator the adapter is
//! constructed from, and the stored credentials handed to `connect`.
//!
//! # Example
//!
//! ```ignore
//! use spastore::{SpaSpec, SpaStore};
//!
//! let store = SpaStore::open("spa.jsonl")?;
//! store.store(&SpaSpec::new("talkie", "https://talkie.example", creds))?;
//! let specs = store.all()?;
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::{SpaSpec, SpaStore, StoreError};
