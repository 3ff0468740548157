//! `networksetup` store
//!
//! Values mirror the argument tail `networksetup` itself accepts:
//! - server: `HOST PORT off` or `HOST PORT on USER PASSWORD`, fields joined by
//!   [`FIELD_SEPARATOR`] so credentials may contain spaces
//! - state: `on` / `off`
//! - bypass domains: space separated domains, or `Empty`

use super::{MacProxyType, NetworkService, NetworkSettings};
use crate::command::CommandRunner;
use crate::error::Result;
use crate::platform::types::Authentication;
use crate::store::SettingsStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::debug;

const PROGRAM: &str = "networksetup";

/// Banner printed before the service list
const DISABLED_BANNER: &str = "An asterisk (*) denotes that a network service is disabled.";

/// Sentinel that clears the bypass domain list
pub const EMPTY_BYPASS: &str = "Empty";

/// Joins the fields of a server value, one field per `networksetup` argument
pub const FIELD_SEPARATOR: &str = "\u{1f}";

static FIELD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z ]*?)\s*:\s*(.*?)\s*$").expect("Invalid FIELD_REGEX pattern")
});

/// What a key addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacKey {
    /// Server, port and credentials of one proxy type on a service
    Server { service: String, kind: MacProxyType },
    /// Whether one proxy type is turned on for a service
    State { service: String, kind: MacProxyType },
    /// Bypass domains of a service
    BypassDomains { service: String },
}

impl MacKey {
    pub fn server(service: &str, kind: MacProxyType) -> Self {
        Self::Server {
            service: service.to_string(),
            kind,
        }
    }

    pub fn state(service: &str, kind: MacProxyType) -> Self {
        Self::State {
            service: service.to_string(),
            kind,
        }
    }

    pub fn bypass_domains(service: &str) -> Self {
        Self::BypassDomains {
            service: service.to_string(),
        }
    }
}

impl fmt::Display for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server { service, kind } => write!(f, "{service}/{kind}/server"),
            Self::State { service, kind } => write!(f, "{service}/{kind}/state"),
            Self::BypassDomains { service } => write!(f, "{service}/bypass"),
        }
    }
}

/// Parsed output of `networksetup -get<type>proxy`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyInfo {
    pub enabled: bool,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub authenticated: bool,
}

/// Server value for `-set<type>proxy`
pub fn server_value(hostname: &str, port: u16, auth: Option<&Authentication>) -> String {
    let port = port.to_string();
    let mut fields = vec![hostname, port.as_str()];
    match auth {
        Some(auth) => fields.extend(["on", auth.username.as_str(), auth.password.as_str()]),
        None => fields.push("off"),
    }
    fields.join(FIELD_SEPARATOR)
}

/// Parse `Enabled:`/`Server:`/`Port:` lines; unknown lines are ignored
pub fn parse_proxy_info(output: &str) -> ProxyInfo {
    let mut info = ProxyInfo::default();
    for line in output.lines() {
        let Some(caps) = FIELD_REGEX.captures(line) else {
            continue;
        };
        let value = &caps[2];
        match &caps[1] {
            "Enabled" => info.enabled = value == "Yes",
            "Server" => info.server = (!value.is_empty()).then(|| value.to_string()),
            "Port" => info.port = value.parse::<u16>().ok().filter(|port| *port > 0),
            "Authenticated Proxy Enabled" => info.authenticated = value == "1",
            _ => {}
        }
    }
    info
}

/// Parse `networksetup -listallnetworkservices`
pub fn parse_network_services(output: &str) -> Vec<NetworkService> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != DISABLED_BANNER)
        .map(|line| match line.strip_prefix('*') {
            Some(name) => NetworkService {
                name: name.trim().to_string(),
                enabled: false,
            },
            None => NetworkService {
                name: line.to_string(),
                enabled: true,
            },
        })
        .collect()
}

/// Parse `networksetup -getproxybypassdomains`, one domain per line
pub fn parse_bypass_domains(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("There aren't any bypass domains"))
        .map(str::to_string)
        .collect()
}

/// Store backed by the `networksetup` utility
pub struct NetworkSetup<R> {
    runner: R,
}

impl<R: CommandRunner> NetworkSetup<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> NetworkSettings for NetworkSetup<R> {
    fn list_network_services(&self) -> Result<Vec<NetworkService>> {
        let output = self.runner.run(PROGRAM, &["-listallnetworkservices"])?;
        Ok(parse_network_services(&output))
    }

    fn proxy_info(&self, service: &str, kind: MacProxyType) -> Result<ProxyInfo> {
        let flag = format!("-get{}proxy", kind.as_str());
        let output = self.runner.run(PROGRAM, &[flag.as_str(), service])?;
        Ok(parse_proxy_info(&output))
    }

    fn bypass_domains(&self, service: &str) -> Result<Vec<String>> {
        let output = self
            .runner
            .run(PROGRAM, &["-getproxybypassdomains", service])?;
        Ok(parse_bypass_domains(&output))
    }
}

impl<R: CommandRunner> SettingsStore for NetworkSetup<R> {
    type Key = MacKey;

    fn get(&self, key: &MacKey) -> Result<String> {
        match key {
            MacKey::Server { service, kind } => {
                let info = self.proxy_info(service, *kind)?;
                if info.authenticated {
                    debug!("{} uses credentials that cannot be read back", key);
                }
                Ok(match (info.server, info.port) {
                    (Some(server), Some(port)) => server_value(&server, port, None),
                    _ => String::new(),
                })
            }
            MacKey::State { service, kind } => {
                let info = self.proxy_info(service, *kind)?;
                Ok(if info.enabled { "on" } else { "off" }.to_string())
            }
            MacKey::BypassDomains { service } => {
                let domains = self.bypass_domains(service)?;
                Ok(if domains.is_empty() {
                    EMPTY_BYPASS.to_string()
                } else {
                    domains.join(" ")
                })
            }
        }
    }

    fn set(&self, key: &MacKey, value: &str) -> Result<()> {
        match key {
            MacKey::Server { service, kind } => {
                if value.is_empty() {
                    // networksetup cannot unset a server
                    debug!("Leaving {} unset", key);
                    return Ok(());
                }
                let flag = format!("-set{}proxy", kind.as_str());
                let mut args = vec![flag.as_str(), service.as_str()];
                args.extend(value.split(FIELD_SEPARATOR));
                self.runner.run(PROGRAM, &args)?;
            }
            MacKey::State { service, kind } => {
                let flag = format!("-set{}proxystate", kind.as_str());
                self.runner
                    .run(PROGRAM, &[flag.as_str(), service.as_str(), value.trim()])?;
            }
            MacKey::BypassDomains { service } => {
                let mut args = vec!["-setproxybypassdomains", service.as_str()];
                let domains: Vec<&str> = value.split_whitespace().collect();
                if domains.is_empty() {
                    args.push(EMPTY_BYPASS);
                } else {
                    args.extend(domains);
                }
                self.runner.run(PROGRAM, &args)?;
            }
        }
        Ok(())
    }
}
