use crate::entity::ResourceFilter;
use crate::error::{ArloError, Result};
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Load environment variables from a `.env` file in the working directory.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

pub fn load_dotenv_from(env_path: &Path) {
    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Variables already in the environment win
        if std::env::var(key).is_err() {
            // SAFETY: called at startup before any other thread is spawned
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// `KEY=value` pairs of a dotenv file, skipping blanks and `#` comments and
/// stripping one layer of matching quotes.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            Some((key.trim(), value))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub events: EventConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Attribute file used when `persist` is set.
    pub path: PathBuf,
    /// Keep attributes across restarts.
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub filter: ResourceFilter,
}

impl StorageConfig {
    /// Open the configured attribute store.
    pub fn open(&self) -> Arc<dyn KeyValueStore> {
        if self.persist {
            Arc::new(JsonFileStore::open(&self.path))
        } else {
            Arc::new(MemoryStore::new())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                path: dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("arlo-entities")
                    .join("attributes.json"),
                persist: true,
            },
            events: EventConfig {
                filter: ResourceFilter::AllowList,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for
    /// `ARLO_STORAGE_PATH`, `ARLO_PERSIST` and `ARLO_EVENT_FILTER`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("ARLO_STORAGE_PATH") {
            config.storage.path = PathBuf::from(path);
        }
        if let Some(persist) = lookup("ARLO_PERSIST") {
            config.storage.persist = parse_flag("ARLO_PERSIST", &persist)?;
        }
        if let Some(filter) = lookup("ARLO_EVENT_FILTER") {
            config.events.filter =
                ResourceFilter::from_str(&filter).map_err(|_| ArloError::InvalidConfig {
                    key: "ARLO_EVENT_FILTER".to_string(),
                    value: filter.clone(),
                })?;
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ArloError::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
