//! GNOME proxy settings through `gsettings`

use super::{verify_config, LinuxProxyConfig, LinuxProxyType};
use crate::command::CommandRunner;
use crate::error::Result;
use crate::platform::types::{Authentication, ProxyEndpoint};
use crate::platform::SystemProxy;
use crate::store::{SettingsStore, WritePlan};
use std::fmt;
use tracing::info;

const PROXY_SCHEMA: &str = "org.gnome.system.proxy";

/// A schema/key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GSettingsKey {
    pub schema: &'static str,
    pub key: &'static str,
}

impl GSettingsKey {
    pub const MODE: GSettingsKey = GSettingsKey::new(PROXY_SCHEMA, "mode");
    pub const IGNORE_HOSTS: GSettingsKey = GSettingsKey::new(PROXY_SCHEMA, "ignore-hosts");
    pub const USE_AUTHENTICATION: GSettingsKey =
        GSettingsKey::new("org.gnome.system.proxy.http", "use-authentication");
    pub const AUTHENTICATION_USER: GSettingsKey =
        GSettingsKey::new("org.gnome.system.proxy.http", "authentication-user");
    pub const AUTHENTICATION_PASSWORD: GSettingsKey =
        GSettingsKey::new("org.gnome.system.proxy.http", "authentication-password");

    pub const fn new(schema: &'static str, key: &'static str) -> Self {
        Self { schema, key }
    }

    pub fn host(kind: LinuxProxyType) -> Self {
        Self::new(type_schema(kind), "host")
    }

    pub fn port(kind: LinuxProxyType) -> Self {
        Self::new(type_schema(kind), "port")
    }
}

impl fmt::Display for GSettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.schema, self.key)
    }
}

fn type_schema(kind: LinuxProxyType) -> &'static str {
    match kind {
        LinuxProxyType::Http => "org.gnome.system.proxy.http",
        LinuxProxyType::Https => "org.gnome.system.proxy.https",
        LinuxProxyType::Ftp => "org.gnome.system.proxy.ftp",
        LinuxProxyType::Socks => "org.gnome.system.proxy.socks",
    }
}

/// dconf-backed store; values are GVariant text such as `'manual'` or `8080`
pub struct GSettings<R> {
    runner: R,
}

impl<R: CommandRunner> GSettings<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> SettingsStore for GSettings<R> {
    type Key = GSettingsKey;

    fn get(&self, key: &GSettingsKey) -> Result<String> {
        let output = self
            .runner
            .run("gsettings", &["get", key.schema, key.key])?;
        Ok(output.trim().to_string())
    }

    fn set(&self, key: &GSettingsKey, value: &str) -> Result<()> {
        self.runner
            .run("gsettings", &["set", key.schema, key.key, value])?;
        Ok(())
    }
}

/// Quote a string as a GVariant string literal
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Strip GVariant string quoting; anything else comes back trimmed
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    let inner = value
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .or_else(|| {
            value
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
        });
    match inner {
        Some(inner) => inner.replace("\\'", "'").replace("\\\\", "\\"),
        None => value.to_string(),
    }
}

/// Format hosts as a GVariant string array
pub fn format_list(hosts: &[String]) -> String {
    let quoted: Vec<String> = hosts.iter().map(|host| quote(host)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Parse `ignore-hosts` output; `None` when nothing is left after stripping
pub fn parse_ignore_hosts(value: &str) -> Option<Vec<String>> {
    let value = value.trim();
    let value = value.strip_prefix("@as").unwrap_or(value);
    let stripped: String = value
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '\'' | ' '))
        .collect();
    if stripped.is_empty() {
        return None;
    }
    Some(
        stripped
            .split(',')
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// GNOME adapter over any [`SettingsStore`] keyed by [`GSettingsKey`]
pub struct GnomeProxy<S> {
    store: S,
}

impl<S: SettingsStore<Key = GSettingsKey>> GnomeProxy<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn read_endpoint(&self, kind: LinuxProxyType) -> Result<Option<ProxyEndpoint>> {
        let host = unquote(&self.store.get(&GSettingsKey::host(kind))?);
        let port = self
            .store
            .get(&GSettingsKey::port(kind))?
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0);

        Ok(match port {
            Some(port) if !host.is_empty() => Some(ProxyEndpoint::new(host, port)),
            _ => None,
        })
    }

    fn read_authentication(&self) -> Result<Option<Authentication>> {
        if self.store.get(&GSettingsKey::USE_AUTHENTICATION)?.trim() != "true" {
            return Ok(None);
        }
        Ok(Some(Authentication {
            username: unquote(&self.store.get(&GSettingsKey::AUTHENTICATION_USER)?),
            password: unquote(&self.store.get(&GSettingsKey::AUTHENTICATION_PASSWORD)?),
        }))
    }

    /// Writes performed by `enable`, in order
    pub fn enable_plan(&self, config: &LinuxProxyConfig) -> WritePlan<GSettingsKey> {
        let mut plan = WritePlan::new();
        plan.write(GSettingsKey::MODE, quote("manual"));

        for (kind, endpoint) in config.endpoints() {
            plan.write(GSettingsKey::host(kind), quote(&endpoint.hostname))
                .write(GSettingsKey::port(kind), endpoint.port.to_string());
        }

        let hosts = config.no_proxy.as_deref().unwrap_or_default();
        plan.write(GSettingsKey::IGNORE_HOSTS, format_list(hosts));

        match &config.authentication {
            Some(auth) => {
                plan.write(GSettingsKey::USE_AUTHENTICATION, "true")
                    .write(GSettingsKey::AUTHENTICATION_USER, quote(&auth.username))
                    .write(GSettingsKey::AUTHENTICATION_PASSWORD, quote(&auth.password));
            }
            None => {
                plan.write(GSettingsKey::USE_AUTHENTICATION, "false");
            }
        }
        plan
    }
}

impl<S: SettingsStore<Key = GSettingsKey>> SystemProxy for GnomeProxy<S> {
    type Config = LinuxProxyConfig;
    type Status = LinuxProxyConfig;
    type Selector = ();

    fn status(&self) -> Result<Option<LinuxProxyConfig>> {
        let mode = unquote(&self.store.get(&GSettingsKey::MODE)?);
        if mode.is_empty() || mode == "none" {
            return Ok(None);
        }

        let mut config = LinuxProxyConfig::default();
        for kind in LinuxProxyType::ALL {
            config.set_endpoint(kind, self.read_endpoint(kind)?);
        }
        config.no_proxy = parse_ignore_hosts(&self.store.get(&GSettingsKey::IGNORE_HOSTS)?);
        config.authentication = self.read_authentication()?;
        Ok(Some(config))
    }

    fn enable(&self, config: &LinuxProxyConfig) -> Result<()> {
        verify_config(config)?;
        let plan = self.enable_plan(config);
        info!("Enabling GNOME proxy ({} writes)", plan.len());
        plan.apply(&self.store)
    }

    fn disable(&self, _selector: Option<&()>) -> Result<()> {
        info!("Disabling GNOME proxy");
        self.store.set(&GSettingsKey::MODE, &quote("none"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::ScriptedRunner;
    use crate::error::ProxiedError;
    use crate::store::memory::MemoryStore;

    fn scenario() -> LinuxProxyConfig {
        LinuxProxyConfig {
            http: Some(ProxyEndpoint::new("10.20.30.11", 1111)),
            https: Some(ProxyEndpoint::new("10.20.30.22", 2222)),
            ftp: Some(ProxyEndpoint::new("10.20.30.33", 3333)),
            socks: Some(ProxyEndpoint::new("10.20.30.44", 4444)),
            no_proxy: Some(vec![
                "localhost".to_string(),
                "192.168.*".to_string(),
                "10.*".to_string(),
            ]),
            authentication: None,
        }
    }

    #[test]
    fn test_quote_and_unquote() {
        assert_eq!(quote("manual"), "'manual'");
        assert_eq!(quote("it's"), r"'it\'s'");
        assert_eq!(unquote("'it\\'s'\n"), "it's");
        assert_eq!(unquote("8080"), "8080");
        assert_eq!(unquote("''"), "");
    }

    #[test]
    fn test_parse_ignore_hosts() {
        assert_eq!(
            parse_ignore_hosts("['localhost', '127.0.0.0/8', '::1']"),
            Some(vec![
                "localhost".to_string(),
                "127.0.0.0/8".to_string(),
                "::1".to_string()
            ])
        );
        assert_eq!(parse_ignore_hosts("@as []"), None);
        assert_eq!(parse_ignore_hosts("[]"), None);
        assert_eq!(parse_ignore_hosts(""), None);
    }

    #[test]
    fn test_format_list() {
        assert_eq!(
            format_list(&["localhost".to_string(), "10.*".to_string()]),
            "['localhost', '10.*']"
        );
        assert_eq!(format_list(&[]), "[]");
    }

    #[test]
    fn test_enable_then_status_round_trips() {
        let proxy = GnomeProxy::new(MemoryStore::new());
        proxy.enable(&scenario()).unwrap();

        let status = proxy.status().unwrap().unwrap();
        assert_eq!(status, scenario());
    }

    #[test]
    fn test_disable_then_status_is_none() {
        let proxy = GnomeProxy::new(MemoryStore::new());
        proxy.enable(&scenario()).unwrap();
        proxy.disable(None).unwrap();

        assert_eq!(proxy.status().unwrap(), None);
        assert_eq!(proxy.store.value(GSettingsKey::MODE).as_deref(), Some("'none'"));
        assert_eq!(
            proxy.store.value(GSettingsKey::host(LinuxProxyType::Http)).as_deref(),
            Some("'10.20.30.11'")
        );
    }

    #[test]
    fn test_authentication_round_trip() {
        let proxy = GnomeProxy::new(MemoryStore::new());
        let config = LinuxProxyConfig {
            http: Some(ProxyEndpoint::new("proxy.local", 3128)),
            authentication: Some(Authentication {
                username: "alice".to_string(),
                password: "s3cret".to_string(),
            }),
            ..Default::default()
        };
        proxy.enable(&config).unwrap();

        let status = proxy.status().unwrap().unwrap();
        assert_eq!(status.authentication, config.authentication);
        assert_eq!(status.no_proxy, None);
    }

    #[test]
    fn test_enable_without_authentication_turns_it_off() {
        let store = MemoryStore::new().with(GSettingsKey::USE_AUTHENTICATION, "true");
        let proxy = GnomeProxy::new(store);
        let config = LinuxProxyConfig {
            https: Some(ProxyEndpoint::new("proxy.local", 3128)),
            ..Default::default()
        };
        proxy.enable(&config).unwrap();

        assert_eq!(
            proxy.store.value(GSettingsKey::USE_AUTHENTICATION).as_deref(),
            Some("false")
        );
        assert_eq!(proxy.status().unwrap().unwrap().authentication, None);
    }

    #[test]
    fn test_enable_plan_order() {
        let proxy = GnomeProxy::new(MemoryStore::new());
        let config = LinuxProxyConfig {
            https: Some(ProxyEndpoint::new("h", 1)),
            ..Default::default()
        };
        let keys: Vec<String> = proxy
            .enable_plan(&config)
            .writes()
            .iter()
            .map(|(key, _)| key.to_string())
            .collect();
        assert_eq!(
            keys,
            vec![
                "org.gnome.system.proxy mode",
                "org.gnome.system.proxy.https host",
                "org.gnome.system.proxy.https port",
                "org.gnome.system.proxy ignore-hosts",
                "org.gnome.system.proxy.http use-authentication",
            ]
        );
    }

    #[test]
    fn test_missing_port_rejected_before_writes() {
        let proxy = GnomeProxy::new(MemoryStore::new());
        let config = LinuxProxyConfig {
            socks: Some(ProxyEndpoint::new("10.0.0.1", 0)),
            ..Default::default()
        };
        let err = proxy.enable(&config).unwrap_err();
        assert!(matches!(err, ProxiedError::Validation(_)));
        assert!(proxy.store.writes().is_empty());
    }

    #[test]
    fn test_failed_write_restores_mode() {
        let store = MemoryStore::new()
            .with(GSettingsKey::MODE, "'none'")
            .failing_on(GSettingsKey::IGNORE_HOSTS);
        let proxy = GnomeProxy::new(store);

        let err = proxy.enable(&scenario()).unwrap_err();
        assert!(matches!(err, ProxiedError::PartialApply { rolled_back: true, .. }));
        assert_eq!(proxy.status().unwrap(), None);
    }

    #[test]
    fn test_status_from_gsettings_output() {
        let runner = ScriptedRunner::new()
            .on("gsettings get org.gnome.system.proxy mode", "'manual'\n")
            .on("gsettings get org.gnome.system.proxy.http host", "'10.0.0.1'\n")
            .on("gsettings get org.gnome.system.proxy.http port", "3128\n")
            .on("gsettings get org.gnome.system.proxy.https host", "''\n")
            .on("gsettings get org.gnome.system.proxy.https port", "0\n")
            .on("gsettings get org.gnome.system.proxy.ftp host", "''\n")
            .on("gsettings get org.gnome.system.proxy.ftp port", "0\n")
            .on("gsettings get org.gnome.system.proxy.socks host", "'10.0.0.2'\n")
            .on("gsettings get org.gnome.system.proxy.socks port", "1080\n")
            .on(
                "gsettings get org.gnome.system.proxy ignore-hosts",
                "['localhost', '127.0.0.0/8']\n",
            )
            .on(
                "gsettings get org.gnome.system.proxy.http use-authentication",
                "false\n",
            );
        let proxy = GnomeProxy::new(GSettings::new(&runner));

        let status = proxy.status().unwrap().unwrap();
        assert_eq!(status.http, Some(ProxyEndpoint::new("10.0.0.1", 3128)));
        assert_eq!(status.https, None);
        assert_eq!(status.ftp, None);
        assert_eq!(status.socks, Some(ProxyEndpoint::new("10.0.0.2", 1080)));
        assert_eq!(
            status.no_proxy,
            Some(vec!["localhost".to_string(), "127.0.0.0/8".to_string()])
        );
        assert_eq!(status.authentication, None);
        assert!(!runner
            .calls()
            .iter()
            .any(|call| call.contains("authentication-user")));
    }

    #[test]
    fn test_gsettings_set_command_line() {
        let runner = ScriptedRunner::new();
        let store = GSettings::new(&runner);
        store
            .set(&GSettingsKey::IGNORE_HOSTS, "['localhost', '10.*']")
            .unwrap();

        assert_eq!(
            runner.calls(),
            vec![r#"gsettings set org.gnome.system.proxy ignore-hosts "['localhost', '10.*']""#.to_string()]
        );
    }
}
