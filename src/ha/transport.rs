//! HTTP transport used by the HA probe

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::time::Duration;

/// Status and body of a probe response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReply {
    pub status: u16,
    pub body: String,
}

impl ProbeReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one GET; transport-level failures are `Error::TierUnreachable`
pub trait ProbeTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<ProbeReply>;
}

/// Blocking reqwest transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ProbeTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<ProbeReply> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::TierUnreachable(format!("GET {}: {}", url, e)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| Error::TierUnreachable(format!("GET {}: reading body: {}", url, e)))?;
        Ok(ProbeReply { status, body })
    }
}
