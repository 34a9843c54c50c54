use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use contactstore::cli::Cli;
use contactstore::config::Config;
use contactstore::{Contact, ContactStore, DEFAULT_SOURCE};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("contactstore starting");

    match cli.command {
        contactstore::cli::Command::List { source } => {
            let mut store = ContactStore::open(&config.db_path)?;
            let contacts = match source {
                Some(source) => store.by_source(&source)?,
                None => store.all()?,
            };
            if contacts.is_empty() {
                println!("No contacts found");
            } else {
                for contact in contacts {
                    println!("{} {}", contact.identifier.cyan(), contact.source.dimmed());
                }
            }
        }
        contactstore::cli::Command::Add { identifier, source } => {
            let mut store = ContactStore::open(&config.db_path)?;
            let contact = Contact::from_source(&identifier, source.as_deref().unwrap_or(DEFAULT_SOURCE));
            store.add(&contact)?;
            println!("{} Added contact: {}", "✓".green(), identifier.cyan());
        }
        contactstore::cli::Command::RemoveSource { source } => {
            let mut store = ContactStore::open(&config.db_path)?;
            let dropped = store.remove_source(&source)?;
            println!("{} Removed {} contacts from source: {}", "✓".green(), dropped, source);
        }
    }

    Ok(())
}
