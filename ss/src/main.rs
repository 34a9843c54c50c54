use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use spastore::cli::Cli;
use spastore::config::Config;
use spastore::{SpaSpec, SpaStore};

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

    info!("spastore starting");

    match cli.command {
        spastore::cli::Command::List => {
            let store = SpaStore::open(&config.store_path)?;
            let specs = store.all()?;
            if specs.is_empty() {
                println!("No SPAs enabled");
            } else {
                for spec in specs {
                    println!("{} {}", spec.name.cyan(), spec.source_locator.dimmed());
                }
            }
        }
        spastore::cli::Command::Enable {
            name,
            source_locator,
            credentials,
        } => {
            let credentials = match credentials {
                Some(raw) => serde_json::from_str(&raw).context("Invalid credentials JSON")?,
                None => serde_json::json!({}),
            };
            let store = SpaStore::open(&config.store_path)?;
            store.store(&SpaSpec::new(&name, &source_locator, credentials))?;
            println!("{} Enabled SPA: {}", "✓".green(), name.cyan());
        }
        spastore::cli::Command::Disable { name } => {
            let store = SpaStore::open(&config.store_path)?;
            if store.remove(&name)? {
                println!("{} Disabled SPA: {}", "✓".green(), name.cyan());
            } else {
                println!("No SPA named: {}", name);
            }
        }
    }

    Ok(())
}
