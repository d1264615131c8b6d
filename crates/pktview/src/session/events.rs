use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::host::Style;
use crate::log::LogId;

/// Change notifications delivered to session listeners, always on the
/// presentation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ItemAdded { index: usize },
    ItemQueried { index: usize },
    ProtocolChanged { old: Option<String>, new: Option<String> },
    LogChanged { old: Option<LogId>, new: Option<LogId> },
    StyleChanged(Style),
}

pub type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct EventHub {
    listeners: RwLock<Vec<(ListenerId, SessionListener)>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: SessionListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Call every listener with `event`. Listeners may subscribe or
    /// unsubscribe from inside the callback.
    pub fn dispatch(&self, event: &SessionEvent) {
        let listeners: Vec<SessionListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}
