//! macOS proxy settings
//!
//! macOS keeps proxy settings per network service (Wi-Fi, Ethernet, ...) and per
//! proxy type. Everything goes through `networksetup`.

pub mod networksetup;

use crate::command::SystemRunner;
use crate::error::Result;
use crate::platform::types::{require_host_port, Authentication};
use crate::platform::SystemProxy;
use crate::store::{SettingsStore, WritePlan};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

pub use networksetup::{MacKey, NetworkSetup, ProxyInfo};

/// Services used when a config names none
pub const DEFAULT_NETWORK_SERVICES: [&str; 2] = ["Wi-Fi", "Ethernet"];

/// Proxy types used when a config names none
pub const DEFAULT_TYPES: [MacProxyType; 2] = [MacProxyType::Web, MacProxyType::SecureWeb];

/// Proxy types understood by `networksetup`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacProxyType {
    Web,
    SecureWeb,
    Ftp,
    SocksFirewall,
    Gopher,
    Streaming,
}

impl MacProxyType {
    pub const ALL: [MacProxyType; 6] = [
        Self::Web,
        Self::SecureWeb,
        Self::Ftp,
        Self::SocksFirewall,
        Self::Gopher,
        Self::Streaming,
    ];

    /// Name used inside `networksetup` flags, e.g. `-getsecurewebproxy`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::SecureWeb => "secureweb",
            Self::Ftp => "ftp",
            Self::SocksFirewall => "socksfirewall",
            Self::Gopher => "gopher",
            Self::Streaming => "streaming",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for MacProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured network service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkService {
    pub name: String,
    pub enabled: bool,
}

/// State of one proxy type on one network service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkServiceProxyStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub proxy_type: MacProxyType,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub pass_domains: Vec<String>,
}

/// macOS proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacProxyConfig {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
    /// Defaults to [`DEFAULT_NETWORK_SERVICES`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_service_names: Option<Vec<String>>,
    /// Defaults to [`DEFAULT_TYPES`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<MacProxyType>>,
}

/// Which proxy types to turn off on which services
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableProxyRequest {
    pub network_service_names: Vec<String>,
    pub types: Vec<MacProxyType>,
}

/// Reads `networksetup` needs beyond plain get/set
pub trait NetworkSettings: SettingsStore<Key = MacKey> {
    fn list_network_services(&self) -> Result<Vec<NetworkService>>;

    fn proxy_info(&self, service: &str, kind: MacProxyType) -> Result<ProxyInfo>;

    fn bypass_domains(&self, service: &str) -> Result<Vec<String>>;
}

/// Services and types of a validated config, defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableTargets {
    pub network_service_names: Vec<String>,
    pub types: Vec<MacProxyType>,
}

/// Check hostname/port and fill in the default services and types
pub fn verify_config(config: &MacProxyConfig) -> Result<EnableTargets> {
    require_host_port(&config.hostname, config.port)?;

    Ok(EnableTargets {
        network_service_names: config.network_service_names.clone().unwrap_or_else(|| {
            DEFAULT_NETWORK_SERVICES
                .iter()
                .map(|name| name.to_string())
                .collect()
        }),
        types: config
            .types
            .clone()
            .unwrap_or_else(|| DEFAULT_TYPES.to_vec()),
    })
}

/// macOS adapter
pub struct MacProxied<S> {
    store: S,
}

impl MacProxied<NetworkSetup<SystemRunner>> {
    /// Adapter bound to the real `networksetup`
    pub fn system() -> Self {
        Self::new(NetworkSetup::new(SystemRunner))
    }
}

impl<S: NetworkSettings> MacProxied<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All configured network services; a `*` prefix marks a disabled one
    pub fn list_network_services(&self) -> Result<Vec<NetworkService>> {
        self.store.list_network_services()
    }

    /// Writes performed by `enable` for an already validated config
    pub fn enable_plan(&self, config: &MacProxyConfig, targets: &EnableTargets) -> WritePlan<MacKey> {
        let server = networksetup::server_value(
            &config.hostname,
            config.port,
            config.authentication.as_ref(),
        );

        let mut plan = WritePlan::new();
        for service in &targets.network_service_names {
            for kind in &targets.types {
                plan.write(MacKey::server(service, *kind), server.clone())
                    .write(MacKey::state(service, *kind), "on");
            }
        }

        let domains = config
            .pass_domains
            .as_ref()
            .filter(|domains| !domains.is_empty())
            .map(|domains| domains.join(" "))
            .unwrap_or_else(|| networksetup::EMPTY_BYPASS.to_string());
        for service in &targets.network_service_names {
            plan.write(MacKey::bypass_domains(service), domains.clone());
        }
        plan
    }

    fn disable_plan(&self, services: &[String], types: &[MacProxyType]) -> WritePlan<MacKey> {
        let mut plan = WritePlan::new();
        for service in services {
            for kind in types {
                plan.write(MacKey::state(service, *kind), "off");
            }
        }
        plan
    }
}

impl<S: NetworkSettings> SystemProxy for MacProxied<S> {
    type Config = MacProxyConfig;
    type Status = Vec<NetworkServiceProxyStatus>;
    type Selector = DisableProxyRequest;

    /// One row per service and proxy type, `None` without any service
    fn status(&self) -> Result<Option<Vec<NetworkServiceProxyStatus>>> {
        let services = self.store.list_network_services()?;
        if services.is_empty() {
            return Ok(None);
        }

        let mut rows = Vec::with_capacity(services.len() * MacProxyType::ALL.len());
        for service in &services {
            let pass_domains = self.store.bypass_domains(&service.name)?;
            for kind in MacProxyType::ALL {
                let info = self.store.proxy_info(&service.name, kind)?;
                let (server, port) = if info.enabled {
                    (info.server, info.port)
                } else {
                    (None, None)
                };
                rows.push(NetworkServiceProxyStatus {
                    name: service.name.clone(),
                    proxy_type: kind,
                    enabled: info.enabled,
                    server,
                    port,
                    pass_domains: pass_domains.clone(),
                });
            }
        }
        Ok(Some(rows))
    }

    fn enable(&self, config: &MacProxyConfig) -> Result<()> {
        let targets = verify_config(config)?;
        let plan = self.enable_plan(config, &targets);
        info!(
            "Enabling proxy {}:{} on {:?} ({} writes)",
            config.hostname,
            config.port,
            targets.network_service_names,
            plan.len()
        );
        plan.apply(&self.store)
    }

    fn disable(&self, request: Option<&DisableProxyRequest>) -> Result<()> {
        let plan = match request {
            Some(request) if request.network_service_names.is_empty() => {
                debug!("Disable request names no network service");
                return Ok(());
            }
            Some(request) => self.disable_plan(&request.network_service_names, &request.types),
            None => {
                let services: Vec<String> = self
                    .store
                    .list_network_services()?
                    .into_iter()
                    .map(|service| service.name)
                    .collect();
                self.disable_plan(&services, &MacProxyType::ALL)
            }
        };

        info!("Disabling proxy ({} writes)", plan.len());
        plan.apply(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::ScriptedRunner;
    use crate::store::memory::MemoryStore;
    use crate::store::SettingsStore;

    /// In-memory network database with a fixed service list
    struct FakeNetwork {
        services: Vec<NetworkService>,
        values: MemoryStore<MacKey>,
    }

    impl FakeNetwork {
        fn new(names: &[&str]) -> Self {
            Self {
                services: names
                    .iter()
                    .map(|name| NetworkService {
                        name: name.to_string(),
                        enabled: true,
                    })
                    .collect(),
                values: MemoryStore::new(),
            }
        }
    }

    impl SettingsStore for FakeNetwork {
        type Key = MacKey;

        fn get(&self, key: &MacKey) -> Result<String> {
            self.values.get(key)
        }

        fn set(&self, key: &MacKey, value: &str) -> Result<()> {
            self.values.set(key, value)
        }
    }

    impl NetworkSettings for FakeNetwork {
        fn list_network_services(&self) -> Result<Vec<NetworkService>> {
            Ok(self.services.clone())
        }

        fn proxy_info(&self, service: &str, kind: MacProxyType) -> Result<ProxyInfo> {
            let server = self.get(&MacKey::server(service, kind))?;
            let mut parts = server.split(networksetup::FIELD_SEPARATOR);
            Ok(ProxyInfo {
                enabled: self.get(&MacKey::state(service, kind))? == "on",
                server: parts.next().map(str::to_string),
                port: parts.next().and_then(|port| port.parse().ok()),
                authenticated: parts.next() == Some("on"),
            })
        }

        fn bypass_domains(&self, service: &str) -> Result<Vec<String>> {
            Ok(self
                .get(&MacKey::bypass_domains(service))?
                .split_whitespace()
                .filter(|domain| *domain != networksetup::EMPTY_BYPASS)
                .map(str::to_string)
                .collect())
        }
    }

    fn full_config(services: &[&str]) -> MacProxyConfig {
        MacProxyConfig {
            hostname: "10.20.30.40".to_string(),
            port: 5060,
            pass_domains: Some(vec![
                "localhost".to_string(),
                "192.168.*".to_string(),
                "10.*".to_string(),
            ]),
            authentication: None,
            network_service_names: Some(services.iter().map(|s| s.to_string()).collect()),
            types: Some(MacProxyType::ALL.to_vec()),
        }
    }

    #[test]
    fn test_type_names() {
        assert_eq!(MacProxyType::SocksFirewall.as_str(), "socksfirewall");
        assert_eq!(MacProxyType::parse("SecureWeb"), Some(MacProxyType::SecureWeb));
        assert_eq!(
            serde_json::to_string(&MacProxyType::SecureWeb).unwrap(),
            "\"secureweb\""
        );
    }

    #[test]
    fn test_verify_applies_defaults() {
        let config = MacProxyConfig {
            hostname: "proxy".to_string(),
            port: 8080,
            ..Default::default()
        };
        let targets = verify_config(&config).unwrap();
        assert_eq!(targets.network_service_names, vec!["Wi-Fi", "Ethernet"]);
        assert_eq!(targets.types, DEFAULT_TYPES.to_vec());
    }

    #[test]
    fn test_verify_requires_host_and_port() {
        let missing_host = MacProxyConfig {
            port: 8080,
            ..Default::default()
        };
        assert!(verify_config(&missing_host).is_err());

        let missing_port = MacProxyConfig {
            hostname: "proxy".to_string(),
            ..Default::default()
        };
        assert!(verify_config(&missing_port).is_err());
    }

    #[test]
    fn test_enable_then_status_per_service() {
        let proxied = MacProxied::new(FakeNetwork::new(&["Wi-Fi", "Ethernet"]));
        let config = full_config(&["Ethernet"]);
        proxied.enable(&config).unwrap();

        let rows = proxied.status().unwrap().unwrap();
        assert_eq!(rows.len(), 12);
        for row in rows.iter().filter(|row| row.name == "Ethernet") {
            assert!(row.enabled);
            assert_eq!(row.server.as_deref(), Some("10.20.30.40"));
            assert_eq!(row.port, Some(5060));
            assert_eq!(Some(&row.pass_domains), config.pass_domains.as_ref());
        }
        for row in rows.iter().filter(|row| row.name == "Wi-Fi") {
            assert!(!row.enabled);
            assert_eq!(row.server, None);
        }
    }

    #[test]
    fn test_enable_without_domains_writes_empty_sentinel() {
        let proxied = MacProxied::new(FakeNetwork::new(&["Wi-Fi"]));
        let config = MacProxyConfig {
            pass_domains: None,
            ..full_config(&["Wi-Fi"])
        };
        proxied.enable(&config).unwrap();

        assert_eq!(
            proxied.store.values.value(MacKey::bypass_domains("Wi-Fi")).as_deref(),
            Some("Empty")
        );
        let rows = proxied.status().unwrap().unwrap();
        assert!(rows.iter().all(|row| row.pass_domains.is_empty()));
    }

    #[test]
    fn test_enable_plan_order_with_credentials() {
        let proxied = MacProxied::new(FakeNetwork::new(&[]));
        let config = MacProxyConfig {
            hostname: "h".to_string(),
            port: 1,
            authentication: Some(Authentication {
                username: "bob".to_string(),
                password: "pw".to_string(),
            }),
            network_service_names: Some(vec!["A".to_string(), "B".to_string()]),
            types: Some(vec![MacProxyType::Web]),
            pass_domains: None,
        };
        let targets = verify_config(&config).unwrap();
        let writes: Vec<String> = proxied
            .enable_plan(&config, &targets)
            .writes()
            .iter()
            .map(|(key, value)| {
                format!("{key}={}", value.replace(networksetup::FIELD_SEPARATOR, "|"))
            })
            .collect();

        assert_eq!(
            writes,
            vec![
                "A/web/server=h|1|on|bob|pw",
                "A/web/state=on",
                "B/web/server=h|1|on|bob|pw",
                "B/web/state=on",
                "A/bypass=Empty",
                "B/bypass=Empty",
            ]
        );
    }

    #[test]
    fn test_spaced_password_is_one_argument() {
        let runner = ScriptedRunner::new();
        let proxied = MacProxied::new(NetworkSetup::new(&runner));
        let config = MacProxyConfig {
            hostname: "10.0.0.1".to_string(),
            port: 8080,
            authentication: Some(Authentication {
                username: "bob".to_string(),
                password: "correct horse".to_string(),
            }),
            network_service_names: Some(vec!["Wi-Fi".to_string()]),
            types: Some(vec![MacProxyType::Web]),
            pass_domains: None,
        };
        proxied.enable(&config).unwrap();

        let calls = runner.calls();
        assert!(
            calls.contains(
                &r#"networksetup -setwebproxy Wi-Fi 10.0.0.1 8080 on bob "correct horse""#
                    .to_string()
            ),
            "{calls:?}"
        );
    }

    #[test]
    fn test_enable_without_host_or_port_runs_no_command() {
        let runner = ScriptedRunner::new();
        let proxied = MacProxied::new(NetworkSetup::new(&runner));

        for config in [
            MacProxyConfig {
                hostname: String::new(),
                ..full_config(&["Wi-Fi"])
            },
            MacProxyConfig {
                port: 0,
                ..full_config(&["Wi-Fi"])
            },
        ] {
            assert!(proxied.enable(&config).unwrap_err().is_rejected_config());
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_disable_requested_types_only() {
        let proxied = MacProxied::new(FakeNetwork::new(&["Wi-Fi", "Ethernet"]));
        proxied.enable(&full_config(&["Wi-Fi", "Ethernet"])).unwrap();

        let request = DisableProxyRequest {
            network_service_names: vec!["Ethernet".to_string()],
            types: MacProxyType::ALL.to_vec(),
        };
        proxied.disable(Some(&request)).unwrap();

        let rows = proxied.status().unwrap().unwrap();
        for row in &rows {
            assert_eq!(row.enabled, row.name == "Wi-Fi", "{row:?}");
        }
    }

    #[test]
    fn test_disable_all_turns_everything_off() {
        let proxied = MacProxied::new(FakeNetwork::new(&["Wi-Fi", "Ethernet"]));
        proxied.enable(&full_config(&["Wi-Fi", "Ethernet"])).unwrap();
        proxied.disable(None).unwrap();

        let rows = proxied.status().unwrap().unwrap();
        assert!(rows.iter().all(|row| !row.enabled));
    }

    #[test]
    fn test_disable_with_no_services_is_noop() {
        let runner = ScriptedRunner::new();
        let proxied = MacProxied::new(NetworkSetup::new(&runner));
        let request = DisableProxyRequest {
            network_service_names: Vec::new(),
            types: MacProxyType::ALL.to_vec(),
        };

        proxied.disable(Some(&request)).unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_status_without_services_is_none() {
        let runner = ScriptedRunner::new().on(
            "networksetup -listallnetworkservices",
            "An asterisk (*) denotes that a network service is disabled.\n",
        );
        let proxied = MacProxied::new(NetworkSetup::new(&runner));

        assert_eq!(proxied.status().unwrap(), None);
    }

    #[test]
    fn test_status_from_networksetup_output() {
        let mut runner = ScriptedRunner::new()
            .on("networksetup -listallnetworkservices", "*Wi-Fi\n")
            .on("networksetup -getproxybypassdomains Wi-Fi", "localhost\n");
        for kind in MacProxyType::ALL {
            let output = if kind == MacProxyType::Web {
                "Enabled: Yes\nServer: 10.0.0.1\nPort: 3128\nAuthenticated Proxy Enabled: 0\n"
            } else {
                "Enabled: No\nServer: \nPort: 0\nAuthenticated Proxy Enabled: 0\n"
            };
            runner = runner.on(&format!("networksetup -get{kind}proxy Wi-Fi"), output);
        }
        let proxied = MacProxied::new(NetworkSetup::new(&runner));

        let services = proxied.list_network_services().unwrap();
        assert_eq!(
            services,
            vec![NetworkService {
                name: "Wi-Fi".to_string(),
                enabled: false
            }]
        );

        let rows = proxied.status().unwrap().unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].proxy_type, MacProxyType::Web);
        assert!(rows[0].enabled);
        assert_eq!(rows[0].server.as_deref(), Some("10.0.0.1"));
        assert_eq!(rows[0].port, Some(3128));
        assert_eq!(rows[0].pass_domains, vec!["localhost"]);
        assert!(rows[1..].iter().all(|row| !row.enabled && row.port.is_none()));
    }
}
