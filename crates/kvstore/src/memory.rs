//! In-memory KV store for tests and local experiments.

use crate::error::{Error, Result};
use crate::{KvStore, normalize_prefix};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock store holding values in a shared map.
///
/// Clones share the same data, so a test can keep one handle for seeding
/// while another is handed to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    data: Arc<Mutex<BTreeMap<String, Value>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryKv {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the store were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Remove every key under `prefix`.
    pub fn delete_tree(&self, prefix: &str) {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.retain(|key, _| !key.starts_with(prefix));
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::unreachable("memory", "store is offline"));
        }
        Ok(())
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check_online()?;
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn list(&self, prefix: &str) -> Result<BTreeMap<String, Value>> {
        self.check_online()?;
        let prefix = normalize_prefix(prefix);
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);

        Ok(data
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, value)| {
                let relative = &key[prefix.len()..];
                // Only direct children, like a separator-scoped listing
                (!relative.is_empty() && !relative.contains('/'))
                    .then(|| (relative.to_string(), value.clone()))
            })
            .collect())
    }

    fn put(&self, key: &str, value: &Value) -> Result<()> {
        self.check_online()?;
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.to_string(), value.clone());
        Ok(())
    }
}
