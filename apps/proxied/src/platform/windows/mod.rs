//! Windows proxy settings
//!
//! WinINet reads three values of the current user's `Internet Settings` key:
//! `ProxyEnable`, `ProxyServer` (`type=host:port;...`) and `ProxyOverride`
//! (`;` separated).

pub mod registry;

use crate::command::SystemRunner;
use crate::error::{ProxiedError, Result};
use crate::platform::types::{require_host_port, split_list};
use crate::platform::SystemProxy;
use crate::store::{SettingsStore, WritePlan};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub use registry::{Registry, RegistryValue, INTERNET_SETTINGS};

/// Protocol prefix of a `ProxyServer` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowsProxyType {
    Http,
    Https,
    Ftp,
    Socks,
}

impl WindowsProxyType {
    pub const ALL: [WindowsProxyType; 4] = [Self::Http, Self::Https, Self::Ftp, Self::Socks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ftp => "ftp",
            Self::Socks => "socks",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for WindowsProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Windows proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsProxyConfig {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub types: Vec<WindowsProxyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#override: Option<Vec<String>>,
}

/// One `type=host:port` entry of `ProxyServer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsProxyServer {
    #[serde(rename = "type")]
    pub proxy_type: WindowsProxyType,
    pub hostname: String,
    pub port: u16,
}

impl fmt::Display for WindowsProxyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}:{}", self.proxy_type, self.hostname, self.port)
    }
}

/// Current Windows proxy configuration
///
/// `hostname` and `port` are those of the first entry; `servers` keeps every
/// entry with its own host and port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsProxyStatus {
    pub hostname: String,
    pub port: u16,
    pub types: Vec<WindowsProxyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#override: Option<Vec<String>>,
    pub servers: Vec<WindowsProxyServer>,
}

/// Parse a `ProxyServer` value, skipping entries that are not `type=host:port`
pub fn parse_proxy_server(value: &str) -> Vec<WindowsProxyServer> {
    split_list(value, ';')
        .into_iter()
        .filter_map(|entry| {
            let server = parse_entry(&entry);
            if server.is_none() {
                warn!("Skipping ProxyServer entry {:?}", entry);
            }
            server
        })
        .collect()
}

fn parse_entry(entry: &str) -> Option<WindowsProxyServer> {
    let (kind, address) = entry.split_once('=')?;
    let (hostname, port) = address.trim().rsplit_once(':')?;
    Some(WindowsProxyServer {
        proxy_type: WindowsProxyType::parse(kind)?,
        hostname: hostname.to_string(),
        port: port.parse().ok()?,
    })
}

fn join_servers(servers: &[WindowsProxyServer]) -> String {
    servers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

/// Reject configs without hostname, port or types
pub fn verify_config(config: &WindowsProxyConfig) -> Result<()> {
    require_host_port(&config.hostname, config.port)?;
    if config.types.is_empty() {
        return Err(ProxiedError::validation("types is required"));
    }
    Ok(())
}

/// Windows adapter
pub struct WindowsProxied<S> {
    store: S,
}

impl WindowsProxied<Registry<SystemRunner>> {
    /// Adapter bound to the real `reg`
    pub fn system() -> Self {
        Self::new(Registry::new(SystemRunner))
    }
}

impl<S: SettingsStore<Key = RegistryValue>> WindowsProxied<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Writes performed by `enable`, in order
    pub fn enable_plan(&self, config: &WindowsProxyConfig) -> WritePlan<RegistryValue> {
        let servers: Vec<WindowsProxyServer> = config
            .types
            .iter()
            .map(|kind| WindowsProxyServer {
                proxy_type: *kind,
                hostname: config.hostname.clone(),
                port: config.port,
            })
            .collect();
        let overrides = config
            .r#override
            .as_ref()
            .map(|hosts| hosts.join(";"))
            .unwrap_or_default();

        let mut plan = WritePlan::new();
        plan.write(RegistryValue::ProxyServer, join_servers(&servers))
            .write(RegistryValue::ProxyOverride, overrides)
            .write(RegistryValue::ProxyEnable, "1");
        plan
    }
}

impl<S: SettingsStore<Key = RegistryValue>> SystemProxy for WindowsProxied<S> {
    type Config = WindowsProxyConfig;
    type Status = WindowsProxyStatus;
    type Selector = [WindowsProxyType];

    fn status(&self) -> Result<Option<WindowsProxyStatus>> {
        let enabled = self.store.get(&RegistryValue::ProxyEnable)?;
        if matches!(enabled.trim(), "" | "0") {
            return Ok(None);
        }

        let servers = parse_proxy_server(&self.store.get(&RegistryValue::ProxyServer)?);
        let overrides = split_list(&self.store.get(&RegistryValue::ProxyOverride)?, ';');
        let (hostname, port) = servers
            .first()
            .map(|server| (server.hostname.clone(), server.port))
            .unwrap_or_default();

        Ok(Some(WindowsProxyStatus {
            hostname,
            port,
            types: servers.iter().map(|server| server.proxy_type).collect(),
            r#override: (!overrides.is_empty()).then_some(overrides),
            servers,
        }))
    }

    fn enable(&self, config: &WindowsProxyConfig) -> Result<()> {
        verify_config(config)?;
        let plan = self.enable_plan(config);
        info!(
            "Enabling Windows proxy {}:{} for {:?}",
            config.hostname, config.port, config.types
        );
        plan.apply(&self.store)
    }

    /// Without types, switch proxying off; otherwise drop those types' entries
    fn disable(&self, types: Option<&[WindowsProxyType]>) -> Result<()> {
        let Some(types) = types else {
            info!("Disabling Windows proxy");
            return self.store.set(&RegistryValue::ProxyEnable, "0");
        };

        let Some(status) = self.status()? else {
            debug!("Proxy already disabled, nothing to remove");
            return Ok(());
        };
        let remaining: Vec<WindowsProxyServer> = status
            .servers
            .into_iter()
            .filter(|server| !types.contains(&server.proxy_type))
            .collect();

        info!("Removing {:?} from ProxyServer", types);
        self.store
            .set(&RegistryValue::ProxyServer, &join_servers(&remaining))
    }
}
