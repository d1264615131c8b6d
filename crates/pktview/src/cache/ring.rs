use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::unit::ParseUnit;

struct Ring {
    slots: Vec<Option<Arc<ParseUnit>>>,
    next: usize,
    evictions: u64,
}

/// Fixed-capacity recency ring of decoded units.
///
/// Units only enter the ring after their decode result was written back,
/// so a released unit is never one the decode worker still holds.
pub struct EvictionCache {
    ring: Mutex<Ring>,
}

impl EvictionCache {
    /// Capacity is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                slots: vec![None; capacity],
                next: 0,
                evictions: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().slots.len()
    }

    /// Store `unit` in the next slot, releasing the unit it overwrites.
    /// Returns true if a different unit was released.
    pub fn push(&self, unit: Arc<ParseUnit>) -> bool {
        let mut ring = self.ring.lock();
        let index = ring.next;

        let mut evicted = false;
        if let Some(old) = ring.slots[index].take() {
            if !Arc::ptr_eq(&old, &unit) {
                old.release();
                evicted = true;
            }
        }

        ring.slots[index] = Some(unit);
        ring.next = (index + 1) % ring.slots.len();
        if evicted {
            ring.evictions += 1;
        }
        evicted
    }

    /// Forget every tracked unit without touching their decode state.
    pub fn clear(&self) {
        let mut ring = self.ring.lock();
        ring.slots.iter_mut().for_each(|slot| *slot = None);
        ring.next = 0;
    }

    pub fn len(&self) -> usize {
        self.ring.lock().slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, unit: &Arc<ParseUnit>) -> bool {
        self.ring
            .lock()
            .slots
            .iter()
            .flatten()
            .any(|u| Arc::ptr_eq(u, unit))
    }

    pub fn stats(&self) -> CacheStats {
        let ring = self.ring.lock();
        CacheStats {
            capacity: ring.slots.len(),
            tracked: ring.slots.iter().filter(|s| s.is_some()).count(),
            evictions: ring.evictions,
        }
    }
}

impl Default for EvictionCache {
    fn default() -> Self {
        Self::new(super::DEFAULT_CAPACITY)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub capacity: usize,
    pub tracked: usize,
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::test_support::{mark_decoded, unit};

    fn decoded(index: usize) -> Arc<ParseUnit> {
        let u = unit(index, b"payload");
        mark_decoded(&u, "payload");
        u
    }

    #[test]
    fn test_capacity_three_scenario() {
        let cache = EvictionCache::new(3);
        let (a, b, c, d, e) = (decoded(0), decoded(1), decoded(2), decoded(3), decoded(4));

        for u in [&a, &b, &c, &d] {
            cache.push(Arc::clone(u));
        }
        assert!(!a.has_decoder() && a.payload().is_none());
        assert!(b.is_decoded() && c.is_decoded() && d.is_decoded());

        cache.push(Arc::clone(&e));
        assert!(!b.has_decoder() && b.payload().is_none());
        assert!(c.is_decoded() && d.is_decoded() && e.is_decoded());
        assert!(c.payload().is_some());
    }

    #[test]
    fn test_n_pushes_release_exactly_the_oldest() {
        let capacity = 5;
        let n = 12;
        let cache = EvictionCache::new(capacity);
        let units: Vec<_> = (0..n).map(decoded).collect();

        for u in &units {
            cache.push(Arc::clone(u));
        }

        let released = units.iter().filter(|u| !u.has_decoder()).count();
        assert_eq!(released, n - capacity);
        for u in &units[n - capacity..] {
            assert!(u.is_decoded(), "unit {} should be intact", u.index());
            assert!(u.payload().is_some());
        }
        assert_eq!(cache.stats().evictions, (n - capacity) as u64);
    }

    #[test]
    fn test_pushing_same_instance_over_itself_does_not_release() {
        let cache = EvictionCache::new(1);
        let a = decoded(0);

        cache.push(Arc::clone(&a));
        let evicted = cache.push(Arc::clone(&a));

        assert!(!evicted);
        assert!(a.is_decoded());
        assert!(cache.contains(&a));
    }

    #[test]
    fn test_clear_keeps_unit_state_and_resets_index() {
        let cache = EvictionCache::new(2);
        let (a, b, c) = (decoded(0), decoded(1), decoded(2));

        cache.push(Arc::clone(&a));
        cache.push(Arc::clone(&b));
        cache.clear();

        assert!(cache.is_empty());
        assert!(a.is_decoded() && b.is_decoded());

        // Index restarted at slot 0: nothing tracked, nothing evicted
        assert!(!cache.push(Arc::clone(&c)));
        assert_eq!(cache.len(), 1);
        assert!(a.is_decoded());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = EvictionCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
