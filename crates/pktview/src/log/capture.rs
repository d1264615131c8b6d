use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use super::{LogId, LogSource, Packet, PacketListener, SubscriptionId};

struct Inner {
    packets: Vec<Packet>,
    listeners: Vec<(SubscriptionId, PacketListener)>,
    next_subscription: u64,
}

/// In-memory capture log.
///
/// Listeners are called while the log lock is held so every listener sees
/// packets in exactly the append order. Listeners must not call back into
/// the same log.
pub struct CaptureLog {
    id: LogId,
    name: String,
    inner: Mutex<Inner>,
}

impl CaptureLog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LogId::next(),
            name: name.into(),
            inner: Mutex::new(Inner {
                packets: Vec::new(),
                listeners: Vec::new(),
                next_subscription: 1,
            }),
        }
    }

    pub fn append(&self, data: impl Into<Bytes>) {
        self.append_packet(Packet::new(data.into()));
    }

    pub fn append_packet(&self, packet: Packet) {
        let mut inner = self.inner.lock();
        for (_, listener) in &inner.listeners {
            listener(packet.clone());
        }
        inner.packets.push(packet);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().packets.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl LogSource for CaptureLog {
    fn id(&self) -> LogId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self, listener: PacketListener) -> SubscriptionId {
        let mut inner = self.inner.lock();
        for packet in &inner.packets {
            listener(packet.clone());
        }

        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.listeners.push((id, listener));

        debug!(log = %self.name, subscription = id.0, backlog = inner.packets.len(), "Log subscriber added");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(sid, _)| *sid != id);
        before != inner.listeners.len()
    }
}
