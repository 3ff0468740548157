//! Settings file
//!
//! Proxy profiles can be kept in `~/.proxied/settings.jsonc`, one optional
//! section per platform:
//!
//! ```jsonc
//! {
//!   // used by `proxied enable` on Linux
//!   "linux": { "http": { "hostname": "10.0.0.1", "port": 3128 } },
//!   "macos": { "hostname": "10.0.0.1", "port": 3128, "types": ["web"] },
//!   "windows": { "hostname": "10.0.0.1", "port": 3128, "types": ["http"] }
//! }
//! ```

use crate::error::{ProxiedError, Result};
use crate::platform::linux::LinuxProxyConfig;
use crate::platform::macos::MacProxyConfig;
use crate::platform::windows::WindowsProxyConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const PROXIED_DIR: &str = ".proxied";
const SETTINGS_FILENAME: &str = "settings.jsonc";

/// Contents of the settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxiedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<LinuxProxyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macos: Option<MacProxyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<WindowsProxyConfig>,
}

/// `~/.proxied/settings.jsonc`
pub fn default_settings_path() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| ProxiedError::config("Could not find home directory"))?;
    Ok(home.join(PROXIED_DIR).join(SETTINGS_FILENAME))
}

/// Parse JSON with comments
pub fn parse_settings(content: &str) -> Result<ProxiedSettings> {
    if content.trim().is_empty() {
        return Ok(ProxiedSettings::default());
    }
    let stripped = json_comments::StripComments::new(content.as_bytes());
    Ok(serde_json::from_reader(stripped)?)
}

/// Load settings from `path`; a missing file means no settings
pub fn load_settings(path: &Path) -> Result<ProxiedSettings> {
    if !path.exists() {
        debug!("Settings file does not exist: {:?}", path);
        return Ok(ProxiedSettings::default());
    }

    let content = fs::read_to_string(path)?;
    parse_settings(&content).map_err(|e| {
        ProxiedError::config(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Load from `path` when given, else from the default location
pub fn load(path: Option<&Path>) -> Result<ProxiedSettings> {
    match path {
        Some(path) => load_settings(path),
        None => load_settings(&default_settings_path()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::macos::MacProxyType;
    use crate::platform::windows::WindowsProxyType;
    use crate::platform::ProxyEndpoint;
    use std::env;

    #[test]
    fn test_parse_settings_with_comments() {
        let content = r#"{
            // office proxy
            "linux": {
                "http": { "hostname": "10.0.0.1", "port": 3128 },
                "noProxy": ["localhost"]
            },
            /* only web traffic */
            "macos": { "hostname": "10.0.0.1", "port": 3128, "types": ["web"] }
        }"#;
        let settings = parse_settings(content).unwrap();

        let linux = settings.linux.unwrap();
        assert_eq!(linux.http, Some(ProxyEndpoint::new("10.0.0.1", 3128)));
        assert_eq!(linux.no_proxy, Some(vec!["localhost".to_string()]));
        let macos = settings.macos.unwrap();
        assert_eq!(macos.types, Some(vec![MacProxyType::Web]));
        assert_eq!(macos.network_service_names, None);
        assert!(settings.windows.is_none());
    }

    #[test]
    fn test_windows_override_key() {
        let content = r#"{ "windows": { "hostname": "h", "port": 1, "types": ["https"], "override": ["<local>"] } }"#;
        let windows = parse_settings(content).unwrap().windows.unwrap();
        assert_eq!(windows.types, vec![WindowsProxyType::Https]);
        assert_eq!(windows.r#override, Some(vec!["<local>".to_string()]));
    }

    #[test]
    fn test_empty_content_is_default() {
        assert_eq!(parse_settings("  \n").unwrap(), ProxiedSettings::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = env::temp_dir().join("proxied_test_missing").join(SETTINGS_FILENAME);
        assert_eq!(load_settings(&path).unwrap(), ProxiedSettings::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let path = env::temp_dir().join("proxied_test_invalid_settings.jsonc");
        fs::write(&path, "{ \"linux\": ").unwrap();

        let err = load_settings(&path).unwrap_err();
        assert!(matches!(err, ProxiedError::Config(_)));

        let _ = fs::remove_file(&path);
    }
}
