//! Switchboard - presence and contacts coordination worker
//!
//! Switchboard sits between UI surfaces ("ports"), pluggable external
//! signaling/presence connectors ("SPAs"), and two local stores, and keeps
//! one authoritative view of the current session, the connected adapters,
//! and the known contacts. Every attached port is kept in sync through
//! broadcast messages carrying full state snapshots.
//!
//! # Core Concepts
//!
//! - **One Actor Owns Everything**: session, roster, adapters, and store
//!   handles are mutated only by the worker task; ports and adapters talk
//!   to it exclusively through messages
//! - **Settle, Don't Race**: adapter loading is a fan-out/fan-in barrier —
//!   every connect attempt is waited on, and a failing adapter never blocks
//!   the rest
//! - **Snapshots, Not Deltas**: roster broadcasts carry the whole derived
//!   view; consumers replace their local state wholesale
//! - **Errors Out-of-Band**: ports never see raw errors on the broadcast
//!   stream; diagnostics travel on a separate channel
//!
//! # Modules
//!
//! - [`worker`] - The coordination core (actor, handle, messages)
//! - [`roster`] - Derived contact/presence merge
//! - [`session`] - Current user state
//! - [`spa`] - Adapter trait, factory, and HTTP reference adapter
//! - [`router`] - Broadcast fan-out and the diagnostics channel
//! - [`ipc`] - Unix-socket port transport
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod daemon;
pub mod ipc;
pub mod roster;
pub mod router;
pub mod session;
pub mod spa;
pub mod worker;

// Re-export commonly used types
pub use config::{Config, StorageConfig, WorkerConfig};
pub use ipc::{Broadcast, PortClient, PortFrame, PortRequest, PortResponse};
pub use roster::{Roster, RosterEntry};
pub use router::{PortId, PortSet, Router};
pub use session::{Presence, Session};
pub use spa::{HttpSpa, Spa, SpaError, SpaEvent, instantiate};
pub use worker::{SpaFactory, Worker, WorkerError, WorkerHandle, WorkerRequest, WorkerStatus};
