//! Load: config loading from file and environment variables.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ViewerError, ViewerResult};

use super::model::{EvictionConfig, ViewerConfig, WorkerConfig};

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl ViewerConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("PKTVIEW_CONFIG_FILE")
            .unwrap_or_else(|_| "/etc/pktview/viewer.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: ViewerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Overlay any PKTVIEW_* environment variables that are set and parse.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("PKTVIEW_AUTO_DECODE") {
            self.auto_decode = v;
        }
        if let Some(v) = env_parse("PKTVIEW_EVICTION_ENABLED") {
            self.eviction.enabled = v;
        }
        if let Some(v) = env_parse("PKTVIEW_CACHE_CAPACITY") {
            self.eviction.capacity = v;
        }
        if let Some(v) = env_parse("PKTVIEW_IDLE_POLL_MS") {
            self.worker.idle_poll_ms = v;
        }
        if let Some(v) = env_parse("PKTVIEW_IDLE_POLLS") {
            self.worker.idle_polls = v;
        }
        if let Ok(path) = std::env::var("PKTVIEW_SETTINGS_FILE") {
            self.settings_path = Some(path);
        }
    }

    pub fn validate(&self) -> ViewerResult<()> {
        self.eviction.validate()?;
        self.worker.validate()
    }
}

impl EvictionConfig {
    pub fn validate(&self) -> ViewerResult<()> {
        if self.capacity == 0 {
            return Err(ViewerError::InvalidConfig("eviction.capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> ViewerResult<()> {
        if self.idle_poll_ms == 0 {
            return Err(ViewerError::InvalidConfig("worker.idle_poll_ms must be > 0".to_string()));
        }
        if self.idle_polls == 0 {
            return Err(ViewerError::InvalidConfig("worker.idle_polls must be > 0".to_string()));
        }
        Ok(())
    }
}
