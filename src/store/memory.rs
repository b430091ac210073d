//! Process-lifetime attribute store.

use super::{KeyValueStore, StorageKey};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<StorageKey, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &StorageKey) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &StorageKey, value: Value) {
        self.entries.write().insert(key.clone(), value);
    }

    fn get_matching(&self, pattern: &StorageKey) -> Vec<(StorageKey, Value)> {
        self.entries
            .read()
            .iter()
            .filter(|(key, _)| key.matches(pattern))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
