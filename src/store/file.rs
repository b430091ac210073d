//! Durable attribute store backed by a JSON file.
//!
//! The whole file is rewritten after every change to a value. Each rewrite
//! goes to a sibling `.tmp` file that is then renamed over the store file.

use super::{KeyValueStore, StorageKey};
use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One stored attribute as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAttribute {
    pub key: StorageKey,
    pub value: Value,
}

/// On-disk layout of the attribute file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedAttributes {
    pub attributes: Vec<PersistedAttribute>,
}

impl PersistedAttributes {
    /// Load from file. A missing or unreadable file yields an empty set.
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<PersistedAttributes>(&bytes) {
                Ok(state) => {
                    info!(
                        "Loaded {} stored attributes from {:?}",
                        state.attributes.len(),
                        path
                    );
                    state
                }
                Err(e) => {
                    warn!("Failed to parse attribute store {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No attribute store at {:?} (first run)", path);
                Self::default()
            }
            Err(e) => {
                error!("Failed to read attribute store {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    fn from_entries(entries: &BTreeMap<StorageKey, Value>) -> Self {
        Self {
            attributes: entries
                .iter()
                .map(|(key, value)| PersistedAttribute {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    /// Save to file, creating parent directories as needed.
    ///
    /// Readers of `path` see either the previous or the new contents, never
    /// a partial write.
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        let tmp = temp_path(path);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Attribute store that mirrors every change to a JSON file.
///
/// The write lock is held across the change and the file rewrite, so
/// concurrent writers are serialized and the file always holds the latest
/// state.
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<BTreeMap<StorageKey, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading whatever it already holds.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = PersistedAttributes::load(&path)
            .attributes
            .into_iter()
            .map(|attr| (attr.key, attr.value))
            .collect();
        Self {
            path,
            state: RwLock::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &StorageKey) -> Option<Value> {
        self.state.read().get(key).cloned()
    }

    fn set(&self, key: &StorageKey, value: Value) {
        let mut state = self.state.write();
        if state.get(key) == Some(&value) {
            return;
        }
        state.insert(key.clone(), value);
        if let Err(e) = PersistedAttributes::from_entries(&state).save(&self.path) {
            error!("Failed to save attribute store {:?}: {}", self.path, e);
        }
    }

    fn get_matching(&self, pattern: &StorageKey) -> Vec<(StorageKey, Value)> {
        self.state
            .read()
            .iter()
            .filter(|(key, _)| key.matches(pattern))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("arlo-entities-{}", uuid::Uuid::new_v4()))
            .join("attributes.json")
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let path = scratch_path();
        let store = JsonFileStore::open(&path);
        assert!(store.get(&StorageKey::new(["camera", "C1", "batteryLevel"])).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = scratch_path();
        let key = StorageKey::new(["camera", "C1", "batteryLevel"]);
        {
            let store = JsonFileStore::open(&path);
            store.set(&key, json!(64));
        }
        assert!(path.exists());

        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get(&key), Some(json!(64)));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_concurrent_sets_survive_reopen() {
        let path = scratch_path();
        let store = JsonFileStore::open(&path);

        std::thread::scope(|scope| {
            for t in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..25 {
                        let key = StorageKey::new([
                            "camera".to_string(),
                            format!("C{t}"),
                            format!("attr{i}"),
                        ]);
                        store.set(&key, json!(i));
                    }
                });
            }
        });
        assert_eq!(store.len(), 200);

        let on_disk: PersistedAttributes =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.attributes.len(), 200);
        assert!(!temp_path(&path).exists());

        let reopened = JsonFileStore::open(store.path());
        assert_eq!(reopened.len(), 200);
        assert_eq!(
            reopened.get(&StorageKey::new(["camera", "C7", "attr24"])),
            Some(json!(24))
        );

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_unchanged_value_skips_rewrite() {
        let path = scratch_path();
        let key = StorageKey::new(["camera", "C1", "batteryLevel"]);
        let store = JsonFileStore::open(&path);
        store.set(&key, json!(64));
        fs::remove_file(&path).unwrap();

        store.set(&key, json!(64));
        assert!(!path.exists());
        store.set(&key, json!(63));
        assert!(path.exists());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let path = scratch_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert!(store.get_matching(&StorageKey::new(["*", "*", "*"])).is_empty());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
