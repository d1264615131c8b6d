//! Log sources: where captured packets come from.

pub mod capture;

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};

pub use capture::CaptureLog;

static NEXT_LOG_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogId(u64);

impl LogId {
    pub fn next() -> Self {
        Self(NEXT_LOG_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A captured packet as emitted by a log source.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Bytes,
    pub captured_at: DateTime<Utc>,
}

impl Packet {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            captured_at: Utc::now(),
        }
    }
}

pub type PacketListener = Box<dyn Fn(Packet) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Source of captured packets.
pub trait LogSource: Send + Sync {
    fn id(&self) -> LogId;

    fn name(&self) -> &str;

    /// Register a listener. Packets already in the log are replayed to it
    /// first, then every appended packet follows in append order.
    fn subscribe(&self, listener: PacketListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

impl std::fmt::Debug for dyn LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSource")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
