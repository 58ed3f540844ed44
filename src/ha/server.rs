//! Host side of the HA check: serves the list of live VMs over HTTP
//!
//! `GET /` answers `{"count": n, "virtualmachines": [...]}` with every running
//! or paused domain. Any other path is a 404.

use super::VmListing;
use crate::error::{Error, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::net::{Ipv6Addr, SocketAddr};
use std::process::Command;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Source of the VM names reported by the webservice
pub trait VmLister: Send + Sync {
    /// Names of running and paused domains
    fn list_vms(&self) -> Result<Vec<String>>;
}

/// virsh settings for the lister
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VirshConfig {
    /// Path to the virsh binary
    pub binary: String,
    /// libvirt connection URI, opened read-only
    pub uri: String,
}

impl Default for VirshConfig {
    fn default() -> Self {
        Self {
            binary: "virsh".to_string(),
            uri: "qemu:///system".to_string(),
        }
    }
}

/// Lists domains through `virsh list`
pub struct VirshLister {
    config: VirshConfig,
}

impl VirshLister {
    pub fn new(config: VirshConfig) -> Self {
        Self { config }
    }

    fn args(&self) -> Vec<String> {
        [
            "--readonly",
            "-c",
            self.config.uri.as_str(),
            "list",
            "--state-running",
            "--state-paused",
            "--name",
        ]
        .iter()
        .map(|a| a.to_string())
        .collect()
    }
}

impl VmLister for VirshLister {
    fn list_vms(&self) -> Result<Vec<String>> {
        let args = self.args();
        debug!(binary = %self.config.binary, args = ?args, "running virsh");
        let output = Command::new(&self.config.binary).args(&args).output()?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: format!("{} {}", self.config.binary, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(parse_names(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// One domain name per line; virsh ends the list with a blank line
fn parse_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Router serving the VM listing on `/`
pub fn router(lister: Arc<dyn VmLister>) -> Router {
    Router::new()
        .route("/", get(list_handler))
        .with_state(lister)
}

async fn list_handler(
    State(lister): State<Arc<dyn VmLister>>,
) -> std::result::Result<Json<VmListing>, (StatusCode, String)> {
    let names = tokio::task::spawn_blocking(move || lister.list_vms())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            error!(error = %e, "failed to list VMs");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    debug!(count = names.len(), "served VM listing");
    Ok(Json(VmListing::new(names)))
}

/// Serve on an already bound listener until the task is dropped
pub async fn serve(listener: TcpListener, lister: Arc<dyn VmLister>) -> Result<()> {
    axum::serve(listener, router(lister)).await?;
    Ok(())
}

/// Bind `[::]:port` (dual-stack where the kernel allows) and serve forever
pub fn run(port: u16, lister: Arc<dyn VmLister>) -> Result<()> {
    let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "HA webservice listening");
        serve(listener, lister).await
    })
}
