//! KDE proxy settings through `kreadconfig5` / `kwriteconfig5`
//!
//! Values live in the `Proxy Settings` group of `kioslaverc`. Plasma 6 ships
//! the same tools with a `6` suffix; they are used when the `5` ones are not on
//! `PATH`.

use super::{verify_config, LinuxProxyConfig, LinuxProxyType};
use crate::command::CommandRunner;
use crate::error::{ProxiedError, Result};
use crate::platform::types::{split_list, ProxyEndpoint};
use crate::platform::SystemProxy;
use crate::store::{SettingsStore, WritePlan};
use std::fmt;
use tracing::{debug, info};
use which::which;

const CONFIG_FILE: &str = "kioslaverc";
const GROUP: &str = "Proxy Settings";

/// Entries of the `Proxy Settings` group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdeKey {
    ProxyType,
    HttpProxy,
    HttpsProxy,
    FtpProxy,
    SocksProxy,
    NoProxyFor,
}

impl KdeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProxyType => "ProxyType",
            Self::HttpProxy => "httpProxy",
            Self::HttpsProxy => "httpsProxy",
            Self::FtpProxy => "ftpProxy",
            Self::SocksProxy => "socksProxy",
            Self::NoProxyFor => "NoProxyFor",
        }
    }

    pub fn endpoint(kind: LinuxProxyType) -> Self {
        match kind {
            LinuxProxyType::Http => Self::HttpProxy,
            LinuxProxyType::Https => Self::HttpsProxy,
            LinuxProxyType::Ftp => Self::FtpProxy,
            LinuxProxyType::Socks => Self::SocksProxy,
        }
    }
}

impl fmt::Display for KdeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation of the kconfig command-line tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdeTools {
    Five,
    Six,
}

impl KdeTools {
    /// Prefer the Plasma 5 tools, fall back to Plasma 6 when only those exist
    pub fn detect() -> Self {
        if which("kreadconfig5").is_err() && which("kreadconfig6").is_ok() {
            debug!("kreadconfig5 not found, using kreadconfig6");
            Self::Six
        } else {
            Self::Five
        }
    }

    fn read(&self) -> &'static str {
        match self {
            Self::Five => "kreadconfig5",
            Self::Six => "kreadconfig6",
        }
    }

    fn write(&self) -> &'static str {
        match self {
            Self::Five => "kwriteconfig5",
            Self::Six => "kwriteconfig6",
        }
    }
}

/// `kioslaverc` store
pub struct KConfig<R> {
    runner: R,
    tools: KdeTools,
}

impl<R: CommandRunner> KConfig<R> {
    pub fn new(runner: R) -> Self {
        Self::with_tools(runner, KdeTools::detect())
    }

    pub fn with_tools(runner: R, tools: KdeTools) -> Self {
        Self { runner, tools }
    }
}

impl<R: CommandRunner> SettingsStore for KConfig<R> {
    type Key = KdeKey;

    fn get(&self, key: &KdeKey) -> Result<String> {
        let output = self.runner.run(
            self.tools.read(),
            &["--file", CONFIG_FILE, "--group", GROUP, "--key", key.as_str()],
        )?;
        Ok(output.trim().to_string())
    }

    fn set(&self, key: &KdeKey, value: &str) -> Result<()> {
        self.runner.run(
            self.tools.write(),
            &[
                "--file",
                CONFIG_FILE,
                "--group",
                GROUP,
                "--key",
                key.as_str(),
                value,
            ],
        )?;
        Ok(())
    }
}

/// Parse a `"host port"` entry; anything else is no endpoint
///
/// The KDE settings dialog stores `http://host port`, so a scheme prefix is
/// dropped. A single `host:port` token is accepted as well.
pub fn parse_endpoint(value: &str) -> Option<ProxyEndpoint> {
    let mut tokens = value.split_whitespace();
    let first = tokens.next()?;
    let host = first.split_once("://").map_or(first, |(_, rest)| rest);

    let (host, port) = match tokens.next() {
        Some(port) => (host, port),
        None => host.rsplit_once(':')?,
    };
    let host = host.trim_end_matches('/');
    let port = port.parse::<u16>().ok().filter(|port| *port > 0)?;
    if host.is_empty() {
        return None;
    }
    Some(ProxyEndpoint::new(host, port))
}

/// KDE adapter over any [`SettingsStore`] keyed by [`KdeKey`]
pub struct KdeProxy<S> {
    store: S,
}

impl<S: SettingsStore<Key = KdeKey>> KdeProxy<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Writes performed by `enable`, in order
    pub fn enable_plan(&self, config: &LinuxProxyConfig) -> WritePlan<KdeKey> {
        let mut plan = WritePlan::new();
        plan.write(KdeKey::ProxyType, "1");
        for (kind, endpoint) in config.endpoints() {
            plan.write(
                KdeKey::endpoint(kind),
                format!("{} {}", endpoint.hostname, endpoint.port),
            );
        }
        let no_proxy = config
            .no_proxy
            .as_ref()
            .map(|hosts| hosts.join(","))
            .unwrap_or_default();
        plan.write(KdeKey::NoProxyFor, no_proxy);
        plan
    }
}

impl<S: SettingsStore<Key = KdeKey>> SystemProxy for KdeProxy<S> {
    type Config = LinuxProxyConfig;
    type Status = LinuxProxyConfig;
    type Selector = ();

    fn status(&self) -> Result<Option<LinuxProxyConfig>> {
        if self.store.get(&KdeKey::ProxyType)? != "1" {
            return Ok(None);
        }

        let mut config = LinuxProxyConfig::default();
        for kind in LinuxProxyType::ALL {
            let value = self.store.get(&KdeKey::endpoint(kind))?;
            config.set_endpoint(kind, parse_endpoint(&value));
        }
        let no_proxy = split_list(&self.store.get(&KdeKey::NoProxyFor)?, ',');
        config.no_proxy = (!no_proxy.is_empty()).then_some(no_proxy);
        Ok(Some(config))
    }

    fn enable(&self, config: &LinuxProxyConfig) -> Result<()> {
        if config.authentication.is_some() {
            return Err(ProxiedError::unsupported_feature(
                "KDE does not support proxy authentication",
            ));
        }
        verify_config(config)?;

        let plan = self.enable_plan(config);
        info!("Enabling KDE proxy ({} writes)", plan.len());
        plan.apply(&self.store)
    }

    fn disable(&self, _selector: Option<&()>) -> Result<()> {
        info!("Disabling KDE proxy");
        self.store.set(&KdeKey::ProxyType, "0")
    }
}
