//! Ordered, rollback-on-failure write sequences
//!
//! Enabling a proxy takes several independent writes. A [`WritePlan`] applies
//! them in order, snapshotting each key just before it is written. When a
//! write fails, the keys already written are restored in reverse order.

use super::SettingsStore;
use crate::error::{ProxiedError, Result};
use std::fmt;
use tracing::{debug, warn};

/// Ordered list of idempotent `(key, value)` writes
#[derive(Debug, Clone)]
pub struct WritePlan<K> {
    writes: Vec<(K, String)>,
}

impl<K> Default for WritePlan<K> {
    fn default() -> Self {
        Self { writes: Vec::new() }
    }
}

impl<K: Clone + fmt::Display> WritePlan<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write
    pub fn write(&mut self, key: K, value: impl Into<String>) -> &mut Self {
        self.writes.push((key, value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[(K, String)] {
        &self.writes
    }

    /// Apply every write in order
    ///
    /// A failure before anything was written is returned as is. A failure after
    /// at least one write triggers a best-effort rollback and is reported as
    /// [`ProxiedError::PartialApply`].
    pub fn apply<S>(&self, store: &S) -> Result<()>
    where
        S: SettingsStore<Key = K> + ?Sized,
    {
        let total = self.writes.len();
        let mut applied: Vec<(&K, String)> = Vec::with_capacity(total);

        for (key, value) in &self.writes {
            let step = store
                .get(key)
                .and_then(|previous| store.set(key, value).map(|()| previous));

            match step {
                Ok(previous) => {
                    debug!("Wrote {} = {:?}", key, value);
                    applied.push((key, previous));
                }
                Err(err) if applied.is_empty() => return Err(err),
                Err(err) => {
                    let count = applied.len();
                    warn!(
                        "Write to {} failed after {} of {} writes, rolling back",
                        key, count, total
                    );
                    let rolled_back = rollback(store, applied);
                    return Err(ProxiedError::PartialApply {
                        applied: count,
                        total,
                        rolled_back,
                        source: Box::new(err),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Restore snapshots newest first; returns whether every restore succeeded
fn rollback<S>(store: &S, applied: Vec<(&S::Key, String)>) -> bool
where
    S: SettingsStore + ?Sized,
{
    let mut clean = true;
    for (key, previous) in applied.into_iter().rev() {
        if let Err(err) = store.set(key, &previous) {
            warn!("Could not restore {}: {}", key, err);
            clean = false;
        }
    }
    clean
}
