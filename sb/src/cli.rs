//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Switchboard - presence and contacts coordination worker
#[derive(Parser)]
#[command(
    name = "switchboard",
    about = "Coordination worker between UI ports, signaling adapters, and local stores",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the switchboard daemon
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Sign the current user in
    Login {
        /// Username to sign in with
        username: String,
    },

    /// Sign out and close the session
    Logout,

    /// Collect a contact
    AddContact {
        /// Identifier value (e.g. an email-like handle)
        identifier: String,
    },

    /// Reload contacts and rebroadcast the roster
    Refresh,

    /// Ping the running worker
    Ping,

    /// Internal: Run as daemon process (used by `daemon start`)
    #[command(hide = true)]
    RunDaemon,
}

/// Daemon management subcommands
#[derive(Debug, Subcommand)]
pub enum DaemonCommand {
    /// Start the worker daemon
    Start {
        /// Run in the foreground instead of forking
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the worker daemon
    Stop,

    /// Show daemon status
    Status,
}
