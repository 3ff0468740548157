//! Read and write the operating system proxy settings
//!
//! Every platform adapter shells out to the native configuration utility
//! (`gsettings`, `kreadconfig5`, `networksetup`, `reg`) and implements
//! [`SystemProxy`].

pub mod command;
pub mod error;
pub mod logging;
pub mod platform;
pub mod settings;
pub mod store;

pub use command::{CommandRunner, SystemRunner};
pub use error::{ProxiedError, Result};
pub use platform::linux::{DesktopEnvironment, LinuxProxied, LinuxProxyConfig, LinuxProxyType};
pub use platform::macos::{
    DisableProxyRequest, MacProxied, MacProxyConfig, MacProxyType, NetworkService,
    NetworkServiceProxyStatus,
};
pub use platform::windows::{
    WindowsProxied, WindowsProxyConfig, WindowsProxyServer, WindowsProxyStatus, WindowsProxyType,
};
pub use platform::{Authentication, ProxyEndpoint, SystemProxy};
pub use store::{SettingsStore, WritePlan};
