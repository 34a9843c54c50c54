//! Switchboard - presence and contacts coordination worker
//!
//! CLI entry point for launching and managing the worker daemon.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use contactstore::ContactStore;
use spastore::SpaStore;
use switchboard::cli::{Cli, Command, DaemonCommand};
use switchboard::config::Config;
use switchboard::daemon::{DaemonManager, VERSION};
use switchboard::ipc::{self, PortClient};
use switchboard::worker::Worker;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("switchboard")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("switchboard.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Daemon { command }) => match command {
            DaemonCommand::Start { foreground } => cmd_start(&config, foreground).await,
            DaemonCommand::Stop => cmd_stop().await,
            DaemonCommand::Status => cmd_status().await,
        },
        Some(Command::RunDaemon) => cmd_run_daemon(&config).await,
        Some(Command::Login { username }) => {
            PortClient::new().login(&username).await?;
            println!("{} Signed in as {}", "✓".green(), username.cyan());
            Ok(())
        }
        Some(Command::Logout) => {
            PortClient::new().logout().await?;
            println!("{} Signed out", "✓".green());
            Ok(())
        }
        Some(Command::AddContact { identifier }) => {
            PortClient::new().add_contact(&identifier).await?;
            println!("{} Added contact: {}", "✓".green(), identifier.cyan());
            Ok(())
        }
        Some(Command::Refresh) => {
            PortClient::new().refresh_contacts().await?;
            println!("{} Roster refreshed", "✓".green());
            Ok(())
        }
        Some(Command::Ping) => {
            let version = PortClient::new().ping().await?;
            println!("Worker is running (version {})", version.cyan());
            Ok(())
        }
        None => cmd_status().await,
    }
}

/// Start the daemon, forked or in the foreground
async fn cmd_start(config: &Config, foreground: bool) -> Result<()> {
    if foreground {
        return cmd_run_daemon(config).await;
    }

    let manager = DaemonManager::new();
    let pid = manager.start()?;
    println!("{} Daemon started (PID {})", "✓".green(), pid);
    Ok(())
}

/// Stop the running daemon
async fn cmd_stop() -> Result<()> {
    let manager = DaemonManager::new();
    manager.stop()?;
    println!("{} Daemon stopped", "✓".green());
    Ok(())
}

/// Show daemon and worker status
async fn cmd_status() -> Result<()> {
    let manager = DaemonManager::new();

    match manager.running_pid() {
        Some(pid) => {
            println!("Daemon: {} (PID {})", "running".green(), pid);
            if !manager.version_matches() {
                let daemon_version = manager.read_version().unwrap_or_else(|| "unknown".to_string());
                println!(
                    "Version: {} (daemon {}, cli {})",
                    "mismatch".yellow(),
                    daemon_version,
                    VERSION
                );
            }

            match PortClient::new().status().await {
                Ok(status) => {
                    let identity = status.session.identity.as_deref().unwrap_or("-");
                    println!("Session: {} ({})", identity, status.session.presence.as_str());
                    println!("SPAs: {}/{} connected", status.connected_spas, status.spa_count);
                    println!("Roster: {} contacts", status.roster_size);
                }
                Err(e) => {
                    warn!(error = %e, "Could not query worker status");
                    println!("Worker: {}", "unreachable".yellow());
                }
            }
        }
        None => {
            println!("Daemon: {}", "not running".red());
        }
    }

    Ok(())
}

/// Run as the daemon process: worker actor plus IPC listener
async fn cmd_run_daemon(config: &Config) -> Result<()> {
    let manager = DaemonManager::new();
    manager.register_self()?;

    info!(version = VERSION, "Switchboard daemon starting");

    let contacts = ContactStore::open(&config.storage.contacts_db).context("Failed to open contact store")?;
    let spa_store = SpaStore::open(&config.storage.spa_store).context("Failed to open SPA store")?;

    let worker = Worker::new(config.worker.clone(), contacts, spa_store);
    let handle = worker.handle();
    let worker_task = tokio::spawn(worker.run());

    // Connect adapters and announce readiness before accepting ports
    handle.initialize().await?;

    let (listener, socket_path) = ipc::create_listener()?;
    info!(socket = %socket_path.display(), "Accepting port connections");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;

    tokio::select! {
        result = ipc::serve(listener, handle.clone(), config.worker.port_buffer) => {
            if let Err(e) = result {
                warn!(error = %e, "IPC listener failed");
            }
        }
        _ = handle.closed() => {
            info!("Worker exited");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    let _ = handle.shutdown().await;
    let _ = worker_task.await;
    ipc::cleanup_socket(&socket_path);

    info!("Switchboard daemon stopped");
    Ok(())
}
