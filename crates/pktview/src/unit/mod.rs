//! Parse unit: one captured packet plus its decode state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::decoder::{DecodedPacket, Decoder};
use crate::log::{LogId, Packet};
use crate::session::SessionId;

/// Where a unit came from: the session, the log, and which attachment of
/// that log (a log detached and re-attached gets a new generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin {
    pub session: SessionId,
    pub log: LogId,
    pub generation: u64,
}

#[derive(Default)]
struct DecodeSlot {
    decoder: Option<Box<dyn Decoder>>,
    payload: Option<Arc<DecodedPacket>>,
    /// Bumped on every release; write-backs from an older epoch are dropped
    epoch: u64,
}

/// Result of taking a unit's decoder out for decoding.
pub(crate) enum Checkout {
    /// Decoder bound and not yet decoded; the caller owns it until check-in
    Pending { decoder: Box<dyn Decoder>, epoch: u64 },
    /// No decoder bound yet
    Unbound { epoch: u64 },
    /// Already decoded, nothing to do
    Decoded,
}

pub struct ParseUnit {
    index: usize,
    packet: Packet,
    origin: Origin,
    /// Set while the unit sits in the work queue or is being decoded
    scheduled: AtomicBool,
    slot: Mutex<DecodeSlot>,
}

impl ParseUnit {
    pub fn new(index: usize, packet: Packet, origin: Origin) -> Self {
        Self {
            index,
            packet,
            origin,
            scheduled: AtomicBool::new(false),
            slot: Mutex::new(DecodeSlot::default()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn data(&self) -> &Bytes {
        &self.packet.data
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.packet.captured_at
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn has_decoder(&self) -> bool {
        self.slot.lock().decoder.is_some()
    }

    pub fn is_decoded(&self) -> bool {
        self.slot
            .lock()
            .decoder
            .as_ref()
            .is_some_and(|d| d.is_decoded())
    }

    /// Decoded payload without counting as a query.
    pub fn payload(&self) -> Option<Arc<DecodedPacket>> {
        self.slot.lock().payload.clone()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Drop decoder and payload. The unit itself stays valid and can be
    /// decoded again later.
    pub fn release(&self) {
        let mut slot = self.slot.lock();
        slot.decoder = None;
        slot.payload = None;
        slot.epoch = slot.epoch.wrapping_add(1);
    }

    /// false -> true; returns false if the unit was already scheduled.
    pub(crate) fn try_schedule(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn unschedule(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    pub(crate) fn checkout(&self) -> Checkout {
        let mut slot = self.slot.lock();
        let epoch = slot.epoch;
        match slot.decoder.take() {
            Some(decoder) if decoder.is_decoded() => {
                slot.decoder = Some(decoder);
                Checkout::Decoded
            }
            Some(decoder) => Checkout::Pending { decoder, epoch },
            None => Checkout::Unbound { epoch },
        }
    }

    /// Put the decoder back with its result. Returns false, discarding both,
    /// when the unit was released since `checkout`.
    pub(crate) fn checkin(
        &self,
        decoder: Box<dyn Decoder>,
        payload: Option<DecodedPacket>,
        epoch: u64,
    ) -> bool {
        let mut slot = self.slot.lock();
        if slot.epoch != epoch {
            return false;
        }
        slot.decoder = Some(decoder);
        if let Some(payload) = payload {
            slot.payload = Some(Arc::new(payload));
        }
        true
    }
}

impl std::fmt::Debug for ParseUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseUnit")
            .field("index", &self.index)
            .field("len", &self.packet.data.len())
            .field("origin", &self.origin)
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn origin() -> Origin {
        Origin {
            session: SessionId::next(),
            log: LogId::next(),
            generation: 1,
        }
    }

    pub fn unit(index: usize, data: &'static [u8]) -> Arc<ParseUnit> {
        Arc::new(ParseUnit::new(index, Packet::new(Bytes::from_static(data)), origin()))
    }

    /// Bind a decoded decoder with the given summary, as the worker would.
    pub fn mark_decoded(unit: &ParseUnit, summary: &str) {
        let epoch = match unit.checkout() {
            Checkout::Unbound { epoch } | Checkout::Pending { epoch, .. } => epoch,
            Checkout::Decoded => return,
        };
        let decoder = Box::new(crate::decoder::UndefinedDecoder::decoded());
        assert!(unit.checkin(decoder, Some(DecodedPacket::with_summary(summary)), epoch));
    }
}
