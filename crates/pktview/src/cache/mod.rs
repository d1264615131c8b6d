/// Decode-state eviction
///
/// Bounds the memory held by decoded payloads: the ring remembers the most
/// recently decoded units and releases the oldest one's decoder and payload
/// when a new unit pushes it out.

pub mod ring;

pub use ring::{EvictionCache, CacheStats};

pub const DEFAULT_CAPACITY: usize = 100;
