//! Boot: logging init, config load, presentation thread, session creation.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::{MemorySettings, SettingsStore, TomlSettings, ViewerConfig};
use crate::decoder::Protocol;
use crate::host::{PresentationHost, ThreadDispatcher};
use crate::protocols::{HexProtocol, TextProtocol};
use crate::session::ViewerSession;

/// Everything `boot` wires together.
pub struct Viewer {
    pub config: ViewerConfig,
    pub host: Arc<ThreadDispatcher>,
    pub session: Arc<ViewerSession>,
}

/// Initialise the tracing / logging subsystem. Logs go to stderr so stdout
/// stays free for decoded output.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pktview=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load config, start the presentation thread and create the session.
/// Must be called from within a tokio runtime.
pub fn boot() -> Result<Viewer, Box<dyn std::error::Error>> {
    info!("Starting pktview v{}", env!("CARGO_PKG_VERSION"));

    let config = ViewerConfig::load()?;
    info!(
        "Decode settings: auto_decode={}, eviction={} (capacity {}), idle exit after {} x {}ms",
        config.auto_decode,
        config.eviction.enabled,
        config.eviction.capacity,
        config.worker.idle_polls,
        config.worker.idle_poll_ms
    );

    let settings: Arc<dyn SettingsStore> = match &config.settings_path {
        Some(path) => {
            info!("Persisting settings to: {}", path);
            Arc::new(TomlSettings::open(path)?)
        }
        None => Arc::new(MemorySettings::new()),
    };

    let host = Arc::new(ThreadDispatcher::spawn("pktview-presentation")?);
    let session = ViewerSession::new(
        &config,
        Arc::clone(&host) as Arc<dyn PresentationHost>,
        settings,
        Handle::current(),
    );
    info!("Initialized viewer session {}", session.id());

    Ok(Viewer { config, host, session })
}

/// Bundled protocol by (case-insensitive) name.
pub fn protocol_by_name(name: &str) -> Option<Arc<dyn Protocol>> {
    match name.to_ascii_lowercase().as_str() {
        "hex" => Some(Arc::new(HexProtocol::new())),
        "text" => Some(Arc::new(TextProtocol::new())),
        _ => None,
    }
}
