//! CLI argument parsing for contactstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cs")]
#[command(author, version, about = "Persistent contact records store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List stored contacts
    List {
        /// Only contacts from this source
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Add a contact
    Add {
        /// Identifier value (e.g. an email-like handle)
        #[arg(required = true)]
        identifier: String,

        /// Source tag (defaults to "local")
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Remove every contact tagged with a source
    RemoveSource {
        /// Source tag to drop
        #[arg(required = true)]
        source: String,
    },
}
