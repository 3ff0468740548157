//! Linux proxy settings
//!
//! Proxy configuration on Linux belongs to the desktop environment. The desktop
//! is detected from `XDG_CURRENT_DESKTOP` by the caller and handed to
//! [`LinuxProxied::new`], which dispatches to the GNOME or KDE adapter.

pub mod gnome;
pub mod kde;

use crate::command::{CommandRunner, SystemRunner};
use crate::error::{ProxiedError, Result};
use crate::platform::types::{Authentication, ProxyEndpoint};
use crate::platform::SystemProxy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

pub use gnome::{GSettings, GSettingsKey, GnomeProxy};
pub use kde::{KConfig, KdeKey, KdeProxy, KdeTools};

/// Environment variable naming the running desktop
pub const DESKTOP_ENV_VAR: &str = "XDG_CURRENT_DESKTOP";

/// Desktop environments recognised by detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DesktopEnvironment {
    Gnome,
    Kde,
    Mate,
}

impl DesktopEnvironment {
    /// Classify an `XDG_CURRENT_DESKTOP` value such as `ubuntu:GNOME`
    pub fn from_xdg(value: &str) -> Result<Self> {
        if value.contains("GNOME") {
            Ok(Self::Gnome)
        } else if value.contains("KDE") {
            Ok(Self::Kde)
        } else if value.contains("MATE") {
            Ok(Self::Mate)
        } else {
            Err(ProxiedError::unsupported_desktop(value.trim()))
        }
    }

    /// Detect the desktop of the current session
    pub fn detect() -> Result<Self> {
        let value = std::env::var(DESKTOP_ENV_VAR).unwrap_or_default();
        Self::from_xdg(&value)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gnome => "GNOME",
            Self::Kde => "KDE",
            Self::Mate => "MATE",
        }
    }
}

impl fmt::Display for DesktopEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Proxy slots available on Linux desktops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxProxyType {
    Http,
    Https,
    Ftp,
    Socks,
}

impl LinuxProxyType {
    pub const ALL: [LinuxProxyType; 4] = [Self::Http, Self::Https, Self::Ftp, Self::Socks];

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

impl fmt::Display for LinuxProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linux proxy configuration, one optional endpoint per proxy type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxProxyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<ProxyEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<ProxyEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ftp: Option<ProxyEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socks: Option<ProxyEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
}

impl LinuxProxyConfig {
    pub fn endpoint(&self, kind: LinuxProxyType) -> Option<&ProxyEndpoint> {
        match kind {
            LinuxProxyType::Http => self.http.as_ref(),
            LinuxProxyType::Https => self.https.as_ref(),
            LinuxProxyType::Ftp => self.ftp.as_ref(),
            LinuxProxyType::Socks => self.socks.as_ref(),
        }
    }

    pub fn set_endpoint(&mut self, kind: LinuxProxyType, endpoint: Option<ProxyEndpoint>) {
        let slot = match kind {
            LinuxProxyType::Http => &mut self.http,
            LinuxProxyType::Https => &mut self.https,
            LinuxProxyType::Ftp => &mut self.ftp,
            LinuxProxyType::Socks => &mut self.socks,
        };
        *slot = endpoint;
    }

    /// Present endpoints in http, https, ftp, socks order
    pub fn endpoints(&self) -> impl Iterator<Item = (LinuxProxyType, &ProxyEndpoint)> {
        LinuxProxyType::ALL
            .into_iter()
            .filter_map(move |kind| self.endpoint(kind).map(|endpoint| (kind, endpoint)))
    }
}

/// Every supplied endpoint needs a hostname and a port
pub(crate) fn verify_config(config: &LinuxProxyConfig) -> Result<()> {
    for (kind, endpoint) in config.endpoints() {
        endpoint.verify().map_err(|err| match err {
            ProxiedError::Validation(msg) => ProxiedError::validation(format!("{kind}: {msg}")),
            other => other,
        })?;
    }
    Ok(())
}

/// Linux adapter, dispatching on the desktop environment
pub enum LinuxProxied<R: CommandRunner> {
    Gnome(GnomeProxy<GSettings<R>>),
    Kde(KdeProxy<KConfig<R>>),
    /// Detected but without an adapter; every operation fails
    Unsupported(DesktopEnvironment),
}

impl<R: CommandRunner> LinuxProxied<R> {
    pub fn new(desktop: DesktopEnvironment, runner: R) -> Self {
        match desktop {
            DesktopEnvironment::Gnome => Self::Gnome(GnomeProxy::new(GSettings::new(runner))),
            DesktopEnvironment::Kde => Self::Kde(KdeProxy::new(KConfig::new(runner))),
            DesktopEnvironment::Mate => Self::Unsupported(desktop),
        }
    }

    pub fn desktop(&self) -> DesktopEnvironment {
        match self {
            Self::Gnome(_) => DesktopEnvironment::Gnome,
            Self::Kde(_) => DesktopEnvironment::Kde,
            Self::Unsupported(desktop) => *desktop,
        }
    }
}

impl LinuxProxied<SystemRunner> {
    /// Detect the desktop from the environment and bind the real utilities
    pub fn from_env() -> Result<Self> {
        let desktop = DesktopEnvironment::detect()?;
        info!("Detected {} desktop", desktop);
        Ok(Self::new(desktop, SystemRunner))
    }
}

impl<R: CommandRunner> SystemProxy for LinuxProxied<R> {
    type Config = LinuxProxyConfig;
    type Status = LinuxProxyConfig;
    type Selector = ();

    fn status(&self) -> Result<Option<LinuxProxyConfig>> {
        match self {
            Self::Gnome(gnome) => gnome.status(),
            Self::Kde(kde) => kde.status(),
            Self::Unsupported(desktop) => Err(ProxiedError::unsupported_desktop(desktop.name())),
        }
    }

    /// Each sub-adapter checks the config before its first write
    fn enable(&self, config: &LinuxProxyConfig) -> Result<()> {
        match self {
            Self::Gnome(gnome) => gnome.enable(config),
            Self::Kde(kde) => kde.enable(config),
            Self::Unsupported(desktop) => Err(ProxiedError::unsupported_desktop(desktop.name())),
        }
    }

    fn disable(&self, _selector: Option<&()>) -> Result<()> {
        match self {
            Self::Gnome(gnome) => gnome.disable(None),
            Self::Kde(kde) => kde.disable(None),
            Self::Unsupported(desktop) => Err(ProxiedError::unsupported_desktop(desktop.name())),
        }
    }
}
