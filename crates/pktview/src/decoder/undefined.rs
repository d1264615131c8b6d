use crate::error::DecodeError;

use super::model::DecodedPacket;
use super::traits::Decoder;

/// Bound when no protocol decoder is available for a unit, or after a
/// decoder panicked. Marks the unit decoded without producing data so it
/// is never scheduled again.
#[derive(Debug, Default)]
pub struct UndefinedDecoder {
    decoded: bool,
}

impl UndefinedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Already in the terminal state
    pub fn decoded() -> Self {
        Self { decoded: true }
    }
}

impl Decoder for UndefinedDecoder {
    fn is_decoded(&self) -> bool {
        self.decoded
    }

    fn decode(&mut self, _packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        self.decoded = true;
        Ok(None)
    }
}
