//! Key/value storage for last-known entity attributes.
//!
//! Every attribute an entity observes is written under a composite key of
//! `(class tag, storage id, attribute[, more segments])`. The store is shared
//! by all entities and must be safe to use from any thread.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wildcard segment accepted by [`KeyValueStore::get_matching`].
pub const WILDCARD: &str = "*";

/// Ordered sequence of key segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(Vec<String>);

impl StorageKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last segment, usually the attribute or table entry name.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Whether this concrete key matches `pattern`, where a `*` segment
    /// matches exactly one segment of any value.
    pub fn matches(&self, pattern: &StorageKey) -> bool {
        self.0.len() == pattern.0.len()
            && self
                .0
                .iter()
                .zip(pattern.0.iter())
                .all(|(seg, pat)| pat == WILDCARD || seg == pat)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Shared attribute store.
pub trait KeyValueStore: Send + Sync {
    /// Last value stored under `key`.
    fn get(&self, key: &StorageKey) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &StorageKey, value: Value);

    /// Every `(key, value)` whose key matches `pattern`, in key order.
    fn get_matching(&self, pattern: &StorageKey) -> Vec<(StorageKey, Value)>;

    /// Last value stored under `key`, or `default` when missing or null.
    fn get_or(&self, key: &StorageKey, default: Value) -> Value {
        match self.get(key) {
            Some(Value::Null) | None => default,
            Some(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_joins_segments() {
        let key = StorageKey::new(["camera", "A1B2", "batteryLevel"]);
        assert_eq!(key.to_string(), "camera/A1B2/batteryLevel");
        assert_eq!(key.last(), Some("batteryLevel"));
    }

    #[test]
    fn test_wildcard_matches_single_segment() {
        let key = StorageKey::new(["location", "L1", "modeNameToId", "armed"]);
        assert!(key.matches(&StorageKey::new(["location", "L1", "modeNameToId", "*"])));
        assert!(key.matches(&StorageKey::new(["*", "*", "*", "*"])));
        assert!(!key.matches(&StorageKey::new(["location", "L1", "*"])));
        assert!(!key.matches(&StorageKey::new(["location", "L2", "modeNameToId", "*"])));
    }
}
