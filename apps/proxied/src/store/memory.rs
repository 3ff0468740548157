//! In-memory store for adapter tests

use super::SettingsStore;
use crate::error::{ProxiedError, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// [`SettingsStore`] over a map keyed by the key's `Display` form
pub struct MemoryStore<K> {
    values: RefCell<HashMap<String, String>>,
    writes: RefCell<Vec<(String, String)>>,
    failing: Option<String>,
    _key: PhantomData<K>,
}

impl<K> MemoryStore<K> {
    pub fn new() -> Self {
        Self {
            values: RefCell::new(HashMap::new()),
            writes: RefCell::new(Vec::new()),
            failing: None,
            _key: PhantomData,
        }
    }

    pub fn with(self, key: impl fmt::Display, value: &str) -> Self {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Make every write to `key` fail
    pub fn failing_on(mut self, key: impl fmt::Display) -> Self {
        self.failing = Some(key.to_string());
        self
    }

    pub fn value(&self, key: impl fmt::Display) -> Option<String> {
        self.values.borrow().get(&key.to_string()).cloned()
    }

    /// Successful writes, in order
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.borrow().clone()
    }
}

impl<K: Clone + fmt::Display> SettingsStore for MemoryStore<K> {
    type Key = K;

    fn get(&self, key: &K) -> Result<String> {
        Ok(self.value(key).unwrap_or_default())
    }

    fn set(&self, key: &K, value: &str) -> Result<()> {
        let key = key.to_string();
        if self.failing.as_deref() == Some(key.as_str()) {
            return Err(ProxiedError::CommandFailed {
                command: format!("set {key}"),
                code: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        self.values
            .borrow_mut()
            .insert(key.clone(), value.to_string());
        self.writes.borrow_mut().push((key, value.to_string()));
        Ok(())
    }
}
