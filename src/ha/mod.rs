//! KVM HA agent health check
//!
//! A small webservice on each KVM host lists the VMs libvirt reports as
//! running. Comparing that count with the expected one tells a dead host
//! apart from a crashed agent. [`server`] is the host side, the rest of this
//! module is the management-server side.

pub mod server;
mod transport;

pub use server::{VirshConfig, VirshLister, VmLister};
pub use transport::{HttpTransport, ProbeReply, ProbeTransport};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default port of the HA webservice
pub const DEFAULT_HA_PORT: u16 = 8080;

/// Default number of retries after the first failed request
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default delay before each retry (2 seconds)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

/// Default per-request timeout (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// HA webservice settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HaConfig {
    /// When false, callers skip the webservice check entirely
    pub enabled: bool,
    /// Webservice port; `None` falls back to [`DEFAULT_HA_PORT`]
    pub port: Option<u16>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: Some(DEFAULT_HA_PORT),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Body served by the webservice, e.g. `{"count": 2, "virtualmachines": ["r-1-VM", "i-2-3-VM"]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmListing {
    pub count: u32,
    #[serde(default)]
    pub virtualmachines: Vec<String>,
}

impl VmListing {
    pub fn new(virtualmachines: Vec<String>) -> Self {
        Self {
            count: virtualmachines.len() as u32,
            virtualmachines,
        }
    }
}

/// Client for one host's HA webservice
pub struct HaAgentClient<T: ProbeTransport = HttpTransport> {
    host: String,
    config: HaConfig,
    transport: T,
}

impl HaAgentClient<HttpTransport> {
    pub fn new(host: impl Into<String>, config: HaConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_millis(config.request_timeout_ms.max(1)))?;
        Ok(Self::with_transport(host, config, transport))
    }
}

impl<T: ProbeTransport> HaAgentClient<T> {
    pub fn with_transport(host: impl Into<String>, config: HaConfig, transport: T) -> Self {
        Self {
            host: host.into(),
            config,
            transport,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn port(&self) -> u16 {
        self.config.port.unwrap_or_else(|| {
            warn!(
                host = %self.host,
                port = DEFAULT_HA_PORT,
                "HA webservice port not set; using the default"
            );
            DEFAULT_HA_PORT
        })
    }

    pub fn url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("http://[{}]:{}/", self.host, self.port())
        } else {
            format!("http://{}:{}/", self.host, self.port())
        }
    }

    /// GET the webservice, retrying transport failures.
    ///
    /// `Ok(None)` means every attempt failed to connect. A non-2xx answer is
    /// an error and is not retried.
    fn fetch(&self, url: &str) -> Result<Option<ProbeReply>> {
        let retries = self.config.max_retries;
        let delay = Duration::from_millis(self.config.retry_delay_ms);

        for attempt in 0..=retries {
            if attempt > 0 {
                thread::sleep(delay);
                debug!(url, attempt, retries, "retrying HA webservice request");
            }
            match self.transport.get(url) {
                Ok(reply) if reply.is_success() => return Ok(Some(reply)),
                Ok(reply) => {
                    return Err(Error::ProbeStatus {
                        url: url.to_string(),
                        status: reply.status,
                    })
                }
                Err(e) => warn!(url, attempt, retries, error = %e, "HA webservice request failed"),
            }
        }

        error!(url, attempts = retries + 1, "HA webservice unreachable");
        Ok(None)
    }

    /// Number of VMs libvirt reports as running, or `None` if the host is unreachable
    pub fn count_running_vms(&self) -> Result<Option<u32>> {
        let url = self.url();
        let Some(reply) = self.fetch(&url)? else {
            return Ok(None);
        };
        let listing: VmListing = serde_json::from_str(reply.body.trim())?;
        debug!(url, count = listing.count, vms = ?listing.virtualmachines, "HA webservice listing");
        Ok(Some(listing.count))
    }

    /// Whether the host looks alive given `expected` running VMs.
    ///
    /// Zero VMs where some were expected means fencing is warranted. Any other
    /// mismatch is logged and treated as healthy, since migrations and
    /// start/stop jobs in flight skew the count.
    pub fn is_healthy(&self, expected: u32) -> Result<bool> {
        let Some(actual) = self.count_running_vms()? else {
            error!(
                host = %self.host,
                "HA health check failed; the agent is unreachable or libvirt validation failed"
            );
            return Ok(false);
        };

        if actual == expected {
            return Ok(true);
        }
        if actual == 0 {
            warn!(host = %self.host, expected, "HA agent found no running VMs");
            return Ok(false);
        }
        warn!(host = %self.host, actual, expected, "HA agent running VM count differs from expected");
        Ok(true)
    }
}
