/// Viewer session
///
/// The session ties one protocol and one log source to an item registry,
/// the decode scheduler and the eviction cache, and relays change
/// notifications to listeners on the presentation thread.
///
/// - `viewer.rs`: `ViewerSession` orchestration
/// - `events.rs`: `SessionEvent` and the listener hub

pub mod events;
pub mod viewer;

use std::sync::atomic::{AtomicU64, Ordering};

pub use events::{EventHub, ListenerId, SessionEvent, SessionListener};
pub use viewer::{SessionMetrics, ViewerSession};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}
