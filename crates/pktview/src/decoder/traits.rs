use crate::error::{DecodeError, ViewerResult};
use crate::session::SessionId;
use crate::unit::ParseUnit;

use super::attachment::Attachment;
use super::model::{Column, DecodedPacket};

/// Per-unit decoder.
///
/// `is_decoded` flips from false to true at most once, during `decode`.
/// Implementations must never flip it back.
pub trait Decoder: Send {
    fn is_decoded(&self) -> bool;

    /// Decode the packet bytes of the unit this decoder was created for.
    /// `Ok(None)` means decoded without producing a payload.
    fn decode(&mut self, packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError>;
}

/// Pluggable decoder factory.
///
/// A protocol is attached to at most one session at a time. `load` and
/// `unload` enforce the transition rules through `attachment()`; protocols
/// that integrate with something external hook `on_load` / `on_unload`,
/// which the session always runs on the presentation thread.
pub trait Protocol: Send + Sync {
    fn name(&self) -> &str;

    /// Column metadata for the presentation layer
    fn columns(&self) -> &[Column];

    /// Create the decoder for `unit`. `None` binds an undefined decoder.
    fn create_decoder(&self, unit: &ParseUnit) -> Option<Box<dyn Decoder>>;

    fn attachment(&self) -> &Attachment;

    fn on_load(&self, _session: SessionId) {}

    fn on_unload(&self, _session: SessionId) {}

    fn load(&self, session: SessionId) -> ViewerResult<()> {
        self.attachment().attach(self.name(), session)?;
        self.on_load(session);
        Ok(())
    }

    fn unload(&self) -> ViewerResult<()> {
        let session = self.attachment().detach(self.name())?;
        self.on_unload(session);
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.attachment().session().is_some()
    }
}

impl std::fmt::Debug for dyn Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("name", &self.name())
            .field("attached", &self.is_attached())
            .finish()
    }
}
