//! CLI argument parsing for spastore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Enabled SPA configuration store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List enabled SPA configurations
    List,

    /// Enable an SPA (store its configuration)
    Enable {
        /// Adapter name
        #[arg(required = true)]
        name: String,

        /// Source locator the adapter is constructed from
        #[arg(required = true)]
        source_locator: String,

        /// Credentials as inline JSON (defaults to "{}")
        #[arg(short = 'r', long)]
        credentials: Option<String>,
    },

    /// Disable an SPA (remove its configuration)
    Disable {
        /// Adapter name
        #[arg(required = true)]
        name: String,
    },
}
