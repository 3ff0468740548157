//! Platform-specific proxy adapters
//!
//! One module per OS configuration store:
//! - **linux**: GNOME (`gsettings`) and KDE (`kreadconfig5`/`kwriteconfig5`)
//! - **macos**: `networksetup`, per network service and proxy type
//! - **windows**: `reg`, the WinINet values under the current user hive
//!
//! The adapters only shell out, so all of them build on every target and the
//! caller picks the one matching the running OS.

pub mod linux;
pub mod macos;
pub mod types;
pub mod windows;

use crate::error::Result;

pub use types::{Authentication, ProxyEndpoint};

/// Common surface of every platform adapter
pub trait SystemProxy {
    /// Argument of `enable`
    type Config;
    /// Result of `status`
    type Status;
    /// Optional narrowing argument of `disable`
    type Selector: ?Sized;

    /// Current proxy configuration, `None` when proxying is off
    fn status(&self) -> Result<Option<Self::Status>>;

    /// Validate `config` and write it to the OS store
    fn enable(&self, config: &Self::Config) -> Result<()>;

    /// Turn proxying off, or only the part named by `selector`
    fn disable(&self, selector: Option<&Self::Selector>) -> Result<()>;
}

/// Name of the OS this binary was built for
pub fn current_os() -> &'static str {
    std::env::consts::OS
}
