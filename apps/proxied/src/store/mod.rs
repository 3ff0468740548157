//! Settings-store port
//!
//! Each platform reads and writes its proxy configuration through a
//! [`SettingsStore`]: a narrow get/set-by-key view over the native utility. All
//! text parsing of utility output lives in the store implementations, so the
//! adapters only see plain values.

use crate::error::Result;
use std::fmt;

pub mod plan;

#[cfg(test)]
pub(crate) mod memory;

pub use plan::WritePlan;

/// Key/value view over an OS configuration store
///
/// `get` must return values in the format `set` accepts, so a value read back
/// can be written again (write plans rely on this for rollback). A key that is
/// not set reads as the empty string.
pub trait SettingsStore {
    type Key: Clone + fmt::Display;

    fn get(&self, key: &Self::Key) -> Result<String>;

    fn set(&self, key: &Self::Key, value: &str) -> Result<()>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for &S {
    type Key = S::Key;

    fn get(&self, key: &Self::Key) -> Result<String> {
        (**self).get(key)
    }

    fn set(&self, key: &Self::Key, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}
