//! Types shared by the platform adapters

use crate::error::{ProxiedError, Result};
use serde::{Deserialize, Serialize};

/// Target of one proxy type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEndpoint {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub port: u16,
}

impl ProxyEndpoint {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    /// Reject an endpoint without hostname or port
    pub fn verify(&self) -> Result<()> {
        require_host_port(&self.hostname, self.port)
    }
}

/// Proxy credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    pub username: String,
    pub password: String,
}

/// Hostname and port are mandatory together
pub(crate) fn require_host_port(hostname: &str, port: u16) -> Result<()> {
    if hostname.trim().is_empty() {
        return Err(ProxiedError::validation("hostname is required"));
    }
    if port == 0 {
        return Err(ProxiedError::validation("port is required"));
    }
    Ok(())
}

/// Split `value` on `separator`, trimming entries and dropping empty ones
pub(crate) fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
