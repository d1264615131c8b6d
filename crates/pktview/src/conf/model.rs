//! Model: ViewerConfig and related structs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Decode units when their data is first read
    pub auto_decode: bool,
    pub eviction: EvictionConfig,
    pub worker: WorkerConfig,
    /// TOML file backing the persisted settings; in-memory when unset
    pub settings_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    pub enabled: bool,
    pub capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub idle_poll_ms: u64,
    /// Consecutive empty polls before the worker stops
    pub idle_polls: u32,
}

impl WorkerConfig {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            auto_decode: true,
            eviction: EvictionConfig::default(),
            worker: WorkerConfig::default(),
            settings_path: None,
        }
    }
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: crate::cache::DEFAULT_CAPACITY,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 100,
            idle_polls: 50,
        }
    }
}
