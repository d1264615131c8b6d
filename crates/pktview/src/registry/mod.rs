//! Item registry: the ordered collection of every parse unit in a session.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::decoder::DecodedPacket;
use crate::log::Packet;
use crate::unit::{Origin, ParseUnit};

/// Receives registry notifications. Called on whichever thread appended or
/// queried; implementations marshal onward themselves.
pub trait RegistryObserver: Send + Sync {
    fn item_added(&self, unit: &Arc<ParseUnit>);
    fn item_queried(&self, unit: &Arc<ParseUnit>);
}

#[derive(Default)]
pub struct ItemRegistry {
    items: RwLock<Vec<Arc<ParseUnit>>>,
    observer: Option<Weak<dyn RegistryObserver>>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: Weak<dyn RegistryObserver>) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            observer: Some(observer),
        }
    }

    /// Append a unit for `packet`; its index is its position.
    pub fn append(&self, packet: Packet, origin: Origin) -> Arc<ParseUnit> {
        let unit = {
            let mut items = self.items.write();
            let unit = Arc::new(ParseUnit::new(items.len(), packet, origin));
            items.push(Arc::clone(&unit));
            unit
        };

        if let Some(observer) = self.observer() {
            observer.item_added(&unit);
        }
        unit
    }

    /// Read a unit's decoded payload. Counts as a query and notifies the
    /// observer, which may schedule the unit for decoding.
    pub fn query(&self, index: usize) -> Option<Arc<DecodedPacket>> {
        let unit = self.get(index)?;
        if let Some(observer) = self.observer() {
            observer.item_queried(&unit);
        }
        unit.payload()
    }

    pub fn get(&self, index: usize) -> Option<Arc<ParseUnit>> {
        self.items.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Point-in-time copy of the unit list for iteration.
    pub fn snapshot(&self) -> Vec<Arc<ParseUnit>> {
        self.items.read().clone()
    }

    /// Drop every unit reference. Decode state is left alone.
    pub fn clear(&self) {
        self.items.write().clear();
    }

    fn observer(&self) -> Option<Arc<dyn RegistryObserver>> {
        self.observer.as_ref().and_then(Weak::upgrade)
    }
}
