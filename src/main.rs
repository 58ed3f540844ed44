//! snapshot-lifecycle CLI - dispatch snapshot operations and check KVM hosts

use clap::{Parser, Subcommand};
use colored::Colorize;
use snapshot_lifecycle::config::Settings;
use snapshot_lifecycle::ha::{self, HaAgentClient, VirshLister};
use snapshot_lifecycle::locks::SnapshotLocks;
use snapshot_lifecycle::store::{Catalog, SnapshotStore};
use snapshot_lifecycle::tier::{ImageStoreBackupTier, RbdPrimaryTier};
use snapshot_lifecycle::{
    Error, Result, SnapshotId, SnapshotOperation, StrategyContext, StrategyDispatcher,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snapshot-lifecycle")]
#[command(about = "Delete, revert and back up volume snapshots", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List snapshots in the catalog
    List,

    /// Show which strategy would handle an operation
    Select {
        /// Snapshot id
        id: String,
        /// Operation (backup, delete, revert)
        operation: String,
    },

    /// Delete a snapshot from every tier
    Delete {
        /// Snapshot id
        id: String,
    },

    /// Roll the snapshot's volume back to it
    Revert {
        /// Snapshot id
        id: String,
    },

    /// Copy a snapshot to the backup image store
    Backup {
        /// Snapshot id
        id: String,
    },

    /// Check a KVM host through its HA webservice
    HaCheck {
        /// Host address
        host: String,
        /// Number of VMs expected to be running
        expected: u32,
    },

    /// Serve this host's running and paused VMs for HA checks
    HaServe {
        /// Listen port (defaults to the configured HA port)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn info(msg: &str) {
    println!("{} {}", "[INFO]".blue(), msg);
}

fn success(msg: &str) {
    println!("{} {}", "[OK]".green(), msg);
}

fn warn(msg: &str) {
    println!("{} {}", "[WARN]".yellow(), msg);
}

fn error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red(), msg);
}

fn parse_id(id: &str) -> Result<SnapshotId> {
    id.parse().map_err(Error::Other)
}

fn build(settings: &Settings) -> Result<(Arc<Catalog>, StrategyDispatcher)> {
    let catalog = Arc::new(Catalog::open(&settings.catalog.path)?);
    let ctx = Arc::new(StrategyContext {
        snapshots: catalog.clone(),
        volumes: catalog.clone(),
        pools: catalog.clone(),
        primary: Arc::new(RbdPrimaryTier::new(settings.rbd.clone())),
        backup: Arc::new(ImageStoreBackupTier::new(settings.image_store.clone())),
    });
    let locks = SnapshotLocks::from_config(&settings.locks);
    Ok((catalog, StrategyDispatcher::with_default_strategies(ctx, locks)))
}

fn cmd_list(catalog: &Catalog) -> Result<()> {
    info("Snapshots:");
    println!();
    println!("{:<8} {:<8} {:<20} {:<18} {}", "ID", "VOLUME", "NAME", "STATE", "COPIES");
    println!("{:<8} {:<8} {:<20} {:<18} {}", "--", "------", "----", "-----", "------");

    let snapshots = catalog.list_snapshots()?;
    if snapshots.is_empty() {
        println!("  (no snapshots)");
    }
    for snap in snapshots {
        let copies: Vec<String> = catalog
            .find_store_refs(snap.id)?
            .iter()
            .map(|r| r.role.to_string())
            .collect();
        println!(
            "{:<8} {:<8} {:<20} {:<18} {}",
            snap.id.to_string(),
            snap.volume_id.to_string(),
            snap.name,
            snap.state.to_string(),
            copies.join(",")
        );
    }

    Ok(())
}

fn cmd_select(catalog: &Catalog, dispatcher: &StrategyDispatcher, id: &str, op: &str) -> Result<()> {
    let id = parse_id(id)?;
    let operation: SnapshotOperation = op.parse().map_err(Error::Other)?;
    let snapshot = catalog
        .find_by_id_including_removed(id)?
        .ok_or(Error::SnapshotNotFound(id))?;

    for (name, priority) in dispatcher.priorities(&snapshot, operation)? {
        println!("  {:<10} {}", name, priority);
    }
    let strategy = dispatcher.select(&snapshot, operation)?;
    success(&format!(
        "Strategy '{}' handles {} of snapshot {}",
        strategy.name(),
        operation,
        id
    ));

    Ok(())
}

fn cmd_operation(dispatcher: &StrategyDispatcher, id: &str, operation: SnapshotOperation) -> Result<()> {
    let id = parse_id(id)?;

    info(&format!("Running {} on snapshot {}...", operation, id));
    if dispatcher.execute(id, operation)? {
        success(&format!("Snapshot {}: {} complete", id, operation));
        Ok(())
    } else {
        Err(Error::Other(format!(
            "Snapshot {}: {} failed; it was left in place for a retry",
            id, operation
        )))
    }
}

fn cmd_ha_check(settings: &Settings, host: &str, expected: u32) -> Result<()> {
    let client = HaAgentClient::new(host, settings.ha.clone())?;
    if !client.is_enabled() {
        warn("HA webservice check is disabled; skipping");
        return Ok(());
    }

    info(&format!("Probing {} (expecting {} running VMs)...", client.url(), expected));
    if client.is_healthy(expected)? {
        success(&format!("Host {} is healthy", host));
        Ok(())
    } else {
        Err(Error::Other(format!("Host {} is unhealthy; fencing is warranted", host)))
    }
}

fn cmd_ha_serve(settings: &Settings, port: Option<u16>) -> Result<()> {
    let port = port.or(settings.ha.port).unwrap_or(ha::DEFAULT_HA_PORT);
    info(&format!("Serving VM listing on port {}...", port));
    ha::server::run(port, Arc::new(VirshLister::new(settings.virsh.clone())))
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let (id, operation) = match cli.command {
        Some(Commands::HaCheck { host, expected }) => {
            return cmd_ha_check(&settings, &host, expected)
        }
        Some(Commands::HaServe { port }) => return cmd_ha_serve(&settings, port),
        None | Some(Commands::List) => {
            let (catalog, _) = build(&settings)?;
            return cmd_list(&catalog);
        }
        Some(Commands::Select { id, operation }) => {
            let (catalog, dispatcher) = build(&settings)?;
            return cmd_select(&catalog, &dispatcher, &id, &operation);
        }
        Some(Commands::Delete { id }) => (id, SnapshotOperation::Delete),
        Some(Commands::Revert { id }) => (id, SnapshotOperation::Revert),
        Some(Commands::Backup { id }) => (id, SnapshotOperation::Backup),
    };

    let (_, dispatcher) = build(&settings)?;
    cmd_operation(&dispatcher, &id, operation)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
