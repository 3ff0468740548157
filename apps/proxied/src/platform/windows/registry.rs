//! `reg` store for the WinINet proxy values

use crate::command::CommandRunner;
use crate::error::{ProxiedError, Result};
use crate::store::SettingsStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::debug;

const PROGRAM: &str = "reg";

/// Key holding the per-user proxy values
pub const INTERNET_SETTINGS: &str =
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings";

/// `NAME    REG_TYPE    VALUE` line of `reg query`
static QUERY_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\S+)\s+(REG_[A-Z_]+)(?:\s+(.*?))?\s*$")
        .expect("Invalid QUERY_LINE_REGEX pattern")
});

/// Values under [`INTERNET_SETTINGS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryValue {
    ProxyEnable,
    ProxyServer,
    ProxyOverride,
}

impl RegistryValue {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProxyEnable => "ProxyEnable",
            Self::ProxyServer => "ProxyServer",
            Self::ProxyOverride => "ProxyOverride",
        }
    }

    pub fn reg_type(&self) -> &'static str {
        match self {
            Self::ProxyEnable => "REG_DWORD",
            Self::ProxyServer | Self::ProxyOverride => "REG_SZ",
        }
    }
}

impl fmt::Display for RegistryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extract the data of `name` from `reg query` output
///
/// DWORDs are printed as hex (`0x1`) and returned in decimal.
pub fn parse_query(output: &str, name: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let caps = QUERY_LINE_REGEX.captures(line)?;
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        let data = caps.get(3).map_or("", |m| m.as_str());
        if &caps[2] == "REG_DWORD" {
            let digits = data.trim_start_matches("0x").trim_start_matches("0X");
            return Some(
                u32::from_str_radix(digits, 16)
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            );
        }
        Some(data.to_string())
    })
}

fn is_missing_value(err: &ProxiedError) -> bool {
    matches!(err, ProxiedError::CommandFailed { stderr, .. } if stderr.contains("unable to find"))
}

/// Store backed by `reg.exe`
pub struct Registry<R> {
    runner: R,
}

impl<R: CommandRunner> Registry<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> SettingsStore for Registry<R> {
    type Key = RegistryValue;

    fn get(&self, key: &RegistryValue) -> Result<String> {
        let output = match self
            .runner
            .run(PROGRAM, &["query", INTERNET_SETTINGS, "/v", key.name()])
        {
            Ok(output) => output,
            Err(err) if is_missing_value(&err) => {
                debug!("{} is not set", key);
                return Ok(String::new());
            }
            Err(err) => return Err(err),
        };
        Ok(parse_query(&output, key.name()).unwrap_or_default())
    }

    fn set(&self, key: &RegistryValue, value: &str) -> Result<()> {
        self.runner.run(
            PROGRAM,
            &[
                "add",
                INTERNET_SETTINGS,
                "/v",
                key.name(),
                "/t",
                key.reg_type(),
                "/d",
                value,
                "/f",
            ],
        )?;
        Ok(())
    }
}
