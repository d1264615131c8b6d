//! Settings: the persisted key-value flags the session reads and writes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

pub const AUTO_DECODE_KEY: &str = "auto_decode_on_query";
pub const EVICTION_ENABLED_KEY: &str = "eviction_cache_enabled";

#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn set_bool(&self, key: &str, value: bool);
}

/// Process-local settings.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: DashMap<String, bool>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).map(|v| *v)
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.values.insert(key.to_string(), value);
    }
}

/// Settings persisted as a flat TOML table, rewritten on every change.
#[derive(Debug)]
pub struct TomlSettings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, bool>>,
}

impl TomlSettings {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, bool>) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string(values)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SettingsStore for TomlSettings {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.lock().get(key).copied()
    }

    fn set_bool(&self, key: &str, value: bool) {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value);
        if let Err(e) = self.persist(&values) {
            warn!(path = %self.path.display(), "Failed to persist settings: {}", e);
        }
    }
}
