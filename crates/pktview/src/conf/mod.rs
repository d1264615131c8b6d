//! Conf module: configuration model, loading, and persisted settings.

pub mod model;
pub mod load;
pub mod settings;

pub use model::{EvictionConfig, ViewerConfig, WorkerConfig};
pub use settings::{MemorySettings, SettingsStore, TomlSettings, AUTO_DECODE_KEY, EVICTION_ENABLED_KEY};
